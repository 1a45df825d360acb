pub mod client;
pub mod kv_store;
pub mod producer;
pub mod publisher;
pub mod traits;

pub use client::NatsClient;
pub use kv_store::NatsKvDocumentStore;
pub use producer::BatchingTelemetryProducer;
pub use publisher::ContextPublisher;
pub use traits::JetStreamPublisher;

#[cfg(any(test, feature = "testing"))]
pub use traits::MockJetStreamPublisher;

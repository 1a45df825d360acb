pub mod error;
pub mod ingest_service;
pub mod producer;
pub mod provider;
pub mod stores;
pub mod timer;
pub mod types;
pub mod validate;

pub use error::{DomainError, DomainResult};
pub use ingest_service::{CredentialRef, TelemetryIngestService};
pub use producer::{TelemetryBatch, TelemetryProducer};
pub use provider::{DataProvider, FetchTelemetryInput, ProviderAdapter, ProviderRegistry};
pub use stores::{DeviceRegistry, DocumentStore, SecretStore};
pub use timer::Timer;
pub use types::{
    AlertSeverity, Device, DeviceCategory, DeviceInfo, PublishSummary, Site, TelemetryAlert,
    TelemetryPoint,
};
pub use validate::validate_struct;

// Re-export mocks when the testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use producer::{MockTelemetryBatch, MockTelemetryProducer};
#[cfg(any(test, feature = "testing"))]
pub use provider::MockProviderAdapter;
#[cfg(any(test, feature = "testing"))]
pub use stores::MockDeviceRegistry;
#[cfg(any(test, feature = "testing"))]
pub use stores::MockDocumentStore;
#[cfg(any(test, feature = "testing"))]
pub use stores::MockSecretStore;

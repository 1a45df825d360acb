use async_trait::async_trait;
use bytes::Bytes;

use crate::error::DomainResult;

/// Shared document store used for cache entries and lock documents.
///
/// Infrastructure (helio-nats) implements this over a JetStream KV bucket;
/// helio-cache ships an in-memory implementation for local mode and tests.
/// `create` is the atomic create-if-absent primitive the distributed lock
/// is built on: the store, not the caller, guarantees at most one creation
/// per key.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document; absent keys are `None`
    async fn get(&self, key: &str) -> DomainResult<Option<Bytes>>;

    /// Write a document, overwriting any existing value
    async fn set(&self, key: &str, value: Bytes) -> DomainResult<()>;

    /// Atomically create a document. Returns false iff the key already exists.
    async fn create(&self, key: &str, value: Bytes) -> DomainResult<bool>;

    /// Delete a document; deleting an absent key is not an error
    async fn delete(&self, key: &str) -> DomainResult<()>;
}

/// Secret material resolver for inbound job requests that reference a
/// stored credential instead of carrying one inline
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn access_secret(&self, name: &str) -> DomainResult<String>;
}

/// Home-platform device registration operations.
///
/// When a provider reports a device as gone, the fetch-telemetry job
/// deprecates the stale registration on our side so it stops being polled.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    async fn deprecate_device(&self, device_id: &str) -> DomainResult<()>;
}

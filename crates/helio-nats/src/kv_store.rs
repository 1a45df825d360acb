use anyhow::Context;
use async_nats::jetstream::kv;
use async_trait::async_trait;
use bytes::Bytes;

use helio_domain::error::DomainResult;
use helio_domain::stores::DocumentStore;

/// Document store over a JetStream KV bucket.
///
/// KV `create` fails when a live value exists for the key, which gives the
/// distributed lock its create-if-absent primitive. Deletes are purges so a
/// released lock key can be created again immediately.
pub struct NatsKvDocumentStore {
    store: kv::Store,
}

impl NatsKvDocumentStore {
    pub fn new(store: kv::Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl DocumentStore for NatsKvDocumentStore {
    async fn get(&self, key: &str) -> DomainResult<Option<Bytes>> {
        let value = self
            .store
            .get(key)
            .await
            .context("Failed to read KV entry")?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Bytes) -> DomainResult<()> {
        self.store
            .put(key, value)
            .await
            .context("Failed to write KV entry")?;
        Ok(())
    }

    async fn create(&self, key: &str, value: Bytes) -> DomainResult<bool> {
        match self.store.create(key, value).await {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == kv::CreateErrorKind::AlreadyExists => Ok(false),
            Err(err) => Err(anyhow::Error::new(err)
                .context("Failed to create KV entry")
                .into()),
        }
    }

    async fn delete(&self, key: &str) -> DomainResult<()> {
        self.store
            .purge(key)
            .await
            .context("Failed to purge KV entry")?;
        Ok(())
    }
}

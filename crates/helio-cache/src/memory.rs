use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;

use helio_domain::error::DomainResult;
use helio_domain::stores::DocumentStore;

/// In-memory document store.
///
/// Used when the service runs in local mode without a NATS deployment, and
/// by tests that need real store semantics instead of mocks. The single
/// mutex gives `create` the same create-if-absent atomicity the KV store
/// guarantees.
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<String, Bytes>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, key: &str) -> DomainResult<Option<Bytes>> {
        let documents = self.documents.lock().await;
        Ok(documents.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Bytes) -> DomainResult<()> {
        let mut documents = self.documents.lock().await;
        documents.insert(key.to_string(), value);
        Ok(())
    }

    async fn create(&self, key: &str, value: Bytes) -> DomainResult<bool> {
        let mut documents = self.documents.lock().await;
        if documents.contains_key(key) {
            return Ok(false);
        }
        documents.insert(key.to_string(), value);
        Ok(true)
    }

    async fn delete(&self, key: &str) -> DomainResult<()> {
        let mut documents = self.documents.lock().await;
        documents.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_absent_key_is_none() {
        let store = MemoryDocumentStore::new();
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_overwrites_existing_value() {
        let store = MemoryDocumentStore::new();
        store.set("k", Bytes::from_static(b"v1")).await.unwrap();
        store.set("k", Bytes::from_static(b"v2")).await.unwrap();

        assert_eq!(store.get("k").await.unwrap().unwrap(), Bytes::from_static(b"v2"));
    }

    #[tokio::test]
    async fn test_create_fails_when_key_exists() {
        let store = MemoryDocumentStore::new();

        assert!(store.create("k", Bytes::from_static(b"v1")).await.unwrap());
        assert!(!store.create("k", Bytes::from_static(b"v2")).await.unwrap());

        // The losing create must not clobber the original value
        assert_eq!(store.get("k").await.unwrap().unwrap(), Bytes::from_static(b"v1"));
    }

    #[tokio::test]
    async fn test_delete_then_create_succeeds() {
        let store = MemoryDocumentStore::new();
        store.create("k", Bytes::from_static(b"v1")).await.unwrap();
        store.delete("k").await.unwrap();

        assert!(store.create("k", Bytes::from_static(b"v2")).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_absent_key_is_ok() {
        let store = MemoryDocumentStore::new();
        assert!(store.delete("missing").await.is_ok());
    }
}

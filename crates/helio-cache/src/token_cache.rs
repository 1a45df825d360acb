use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use helio_domain::error::DomainResult;
use helio_domain::stores::DocumentStore;

use crate::lock::DistributedLock;

const TOKEN_PREFIX: &str = "token:";

/// Cached token document. Once `expire_at` is in the past the entry is
/// treated as absent.
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    value: String,
    expire_at: DateTime<Utc>,
}

/// The real network authentication against a provider. Implemented by the
/// provider auth clients; the cache composes around it explicitly.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TokenFetcher: Send + Sync {
    async fn fetch_token(&self, credential: &str) -> DomainResult<String>;
}

/// TTL-based memoization of provider bearer tokens, keyed by the SHA-256
/// of the raw credential so credentials are never stored verbatim.
///
/// Population is serialized through the distributed lock: under concurrent
/// cache-miss callers with the same credential, exactly one performs the
/// network fetch per TTL window and the rest observe the fresh entry
/// (stampede prevention). The provider's own expiry is not trusted; the
/// local TTL is chosen conservatively shorter than the real token
/// lifetime, and the lock TTL shorter still.
pub struct TokenCache {
    store: Arc<dyn DocumentStore>,
    lock: DistributedLock,
    token_ttl: Duration,
    enabled: bool,
}

impl TokenCache {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        lock_ttl: Duration,
        token_ttl: Duration,
        enabled: bool,
    ) -> Self {
        let lock = DistributedLock::new(store.clone(), lock_ttl);
        Self {
            store,
            lock,
            token_ttl,
            enabled,
        }
    }

    fn cache_key(credential: &str) -> String {
        let digest = Sha256::digest(credential.as_bytes());
        format!("{}{}", TOKEN_PREFIX, hex::encode(digest))
    }

    /// Return the cached token for the credential, fetching and storing a
    /// fresh one when the entry is absent or expired.
    ///
    /// When caching is disabled (local mode) the fetcher is called
    /// directly on every request.
    pub async fn get_or_fetch(
        &self,
        credential: &str,
        fetcher: &dyn TokenFetcher,
    ) -> DomainResult<String> {
        if !self.enabled {
            return fetcher.fetch_token(credential).await;
        }

        let cache_key = Self::cache_key(credential);

        self.lock.acquire(&cache_key).await;
        let result = self.populate(credential, &cache_key, fetcher).await;
        self.lock.release(&cache_key).await;

        result
    }

    async fn populate(
        &self,
        credential: &str,
        cache_key: &str,
        fetcher: &dyn TokenFetcher,
    ) -> DomainResult<String> {
        if let Some(bytes) = self.store.get(cache_key).await? {
            if let Ok(entry) = serde_json::from_slice::<CacheEntry>(&bytes) {
                if entry.expire_at > Utc::now() {
                    debug!(key = %cache_key, "token cache hit");
                    return Ok(entry.value);
                }
            }
        }

        debug!(key = %cache_key, "token cache miss, fetching");
        let token = fetcher.fetch_token(credential).await?;

        let entry = CacheEntry {
            value: token.clone(),
            expire_at: Utc::now() + self.token_ttl,
        };
        let bytes = serde_json::to_vec(&entry).context("failed to serialize cache entry")?;
        self.store.set(cache_key, bytes.into()).await?;

        Ok(token)
    }
}

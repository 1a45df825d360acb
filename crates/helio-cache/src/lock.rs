use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use helio_domain::error::DomainResult;
use helio_domain::stores::DocumentStore;

const LOCK_PREFIX: &str = "_lock:";

/// Lock document kept in the shared store while a holder owns the lock
#[derive(Debug, Serialize, Deserialize)]
struct LockEntry {
    expire_at: DateTime<Utc>,
}

/// Mutual exclusion across distributed callers, built on the document
/// store's atomic create-if-absent primitive.
///
/// The holder deletes its entry on release; any other acquirer that finds
/// an entry whose TTL has elapsed deletes it first (stale-lock
/// reclamation), so a crashed holder cannot block acquisition for longer
/// than the lock TTL. The staleness check and the subsequent create are
/// two separate store operations; the store's atomic create rejects all
/// but one of the racing re-creations, which is the intended guarantee.
pub struct DistributedLock {
    store: Arc<dyn DocumentStore>,
    ttl: Duration,
}

impl DistributedLock {
    pub fn new(store: Arc<dyn DocumentStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    fn lock_key(key: &str) -> String {
        format!("{}{}", LOCK_PREFIX, key)
    }

    /// Attempt to acquire the lock once.
    ///
    /// Returns true iff this caller created the lock entry. Contention and
    /// store errors are not distinguished: both come back as false and are
    /// retried identically by `acquire`.
    pub async fn try_acquire(&self, key: &str) -> bool {
        match self.try_acquire_inner(key).await {
            Ok(acquired) => acquired,
            Err(err) => {
                warn!(key = %key, error = %err, "lock acquisition attempt failed");
                false
            }
        }
    }

    async fn try_acquire_inner(&self, key: &str) -> DomainResult<bool> {
        let lock_key = Self::lock_key(key);

        if let Some(bytes) = self.store.get(&lock_key).await? {
            match serde_json::from_slice::<LockEntry>(&bytes) {
                Ok(entry) if entry.expire_at <= Utc::now() => {
                    debug!(key = %key, "reclaiming stale lock");
                    self.store.delete(&lock_key).await?;
                }
                Ok(_) => {
                    // Held by a live owner; the create below will lose
                }
                Err(_) => {
                    // An unreadable lock entry can never be released by its
                    // owner, so treat it the same as a stale one
                    warn!(key = %key, "deleting unparsable lock entry");
                    self.store.delete(&lock_key).await?;
                }
            }
        }

        let entry = LockEntry {
            expire_at: Utc::now() + self.ttl,
        };
        let bytes = serde_json::to_vec(&entry).context("failed to serialize lock entry")?;

        self.store.create(&lock_key, bytes.into()).await
    }

    /// Spin until the lock is acquired, sleeping a random sub-second
    /// interval between attempts. There is no maximum wait; a stuck holder
    /// is bounded only by TTL reclamation.
    pub async fn acquire(&self, key: &str) {
        loop {
            if self.try_acquire(key).await {
                debug!(key = %key, "lock acquired");
                return;
            }
            let wait = Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..1.0));
            tokio::time::sleep(wait).await;
        }
    }

    /// Delete the lock entry unconditionally. Called by the holder exactly
    /// once, on success and failure paths alike; a failed delete is logged
    /// and left for TTL reclamation.
    pub async fn release(&self, key: &str) {
        if let Err(err) = self.store.delete(&Self::lock_key(key)).await {
            warn!(key = %key, error = %err, "lock release failed, TTL will reclaim");
        }
    }
}

use async_trait::async_trait;
use bytes::Bytes;

use helio_domain::error::DomainResult;

/// Acknowledged publish onto a JetStream subject.
///
/// The batching producer fans publishes out over this seam so its
/// bookkeeping can be tested without a broker.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait JetStreamPublisher: Send + Sync {
    async fn publish(&self, subject: String, payload: Bytes) -> DomainResult<()>;
}

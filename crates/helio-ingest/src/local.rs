use async_trait::async_trait;
use bytes::Bytes;
use tracing::info;

use helio_domain::error::DomainResult;
use helio_nats::JetStreamPublisher;

/// Publisher used in local mode: logs the message instead of sending it,
/// so the full job pipeline can be exercised without a broker.
pub struct LoggingPublisher;

#[async_trait]
impl JetStreamPublisher for LoggingPublisher {
    async fn publish(&self, subject: String, payload: Bytes) -> DomainResult<()> {
        info!(
            subject = %subject,
            size_bytes = payload.len(),
            "local mode: dropping telemetry message"
        );
        Ok(())
    }
}

use async_trait::async_trait;

use crate::error::DomainResult;
use crate::types::{PublishSummary, TelemetryAlert, TelemetryPoint};

/// One job invocation's publishes.
///
/// `publish_*` fires a publish and returns once it is tracked, not once it
/// is acknowledged; `wait_until_published` is the blocking barrier that
/// drains every publish tracked by this batch, logging per-message
/// failures without failing the batch. A batch belongs to exactly one job,
/// so its summary can never count another invocation's messages.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TelemetryBatch: Send {
    async fn publish_point(&mut self, point: &TelemetryPoint) -> DomainResult<()>;

    async fn publish_alert(&mut self, alert: &TelemetryAlert) -> DomainResult<()>;

    async fn wait_until_published(&mut self) -> PublishSummary;
}

/// Factory for per-invocation publish batches
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait TelemetryProducer: Send + Sync {
    fn batch(&self) -> Box<dyn TelemetryBatch>;
}

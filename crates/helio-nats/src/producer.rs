use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use helio_domain::error::DomainResult;
use helio_domain::producer::{TelemetryBatch, TelemetryProducer};
use helio_domain::types::{PublishSummary, TelemetryAlert, TelemetryPoint};

use crate::traits::JetStreamPublisher;

/// Hands each job invocation its own publish batch.
///
/// The producer itself is stateless; all in-flight bookkeeping lives in
/// the batch, so concurrent jobs can never observe or drain each other's
/// publishes.
pub struct BatchingTelemetryProducer {
    publisher: Arc<dyn JetStreamPublisher>,
    base_subject: String,
}

impl BatchingTelemetryProducer {
    pub fn new(publisher: Arc<dyn JetStreamPublisher>, base_subject: String) -> Self {
        info!(
            "Created BatchingTelemetryProducer with base subject: {}",
            base_subject
        );
        Self {
            publisher,
            base_subject,
        }
    }
}

impl TelemetryProducer for BatchingTelemetryProducer {
    fn batch(&self) -> Box<dyn TelemetryBatch> {
        Box::new(TelemetryPublishBatch {
            publisher: self.publisher.clone(),
            base_subject: self.base_subject.clone(),
            in_flight: Vec::new(),
        })
    }
}

/// One invocation's publishes, each fanned out as its own task.
///
/// `publish_*` returns once the task is tracked; `wait_until_published`
/// joins every task this batch spawned and reports counts. A failed
/// message is logged and counted, never propagated, so one bad publish
/// cannot sink the rest of the batch.
pub struct TelemetryPublishBatch {
    publisher: Arc<dyn JetStreamPublisher>,
    base_subject: String,
    in_flight: Vec<JoinHandle<DomainResult<()>>>,
}

impl TelemetryPublishBatch {
    fn track(&mut self, subject: String, payload: Vec<u8>) {
        let publisher = self.publisher.clone();
        let handle =
            tokio::spawn(async move { publisher.publish(subject, payload.into()).await });
        self.in_flight.push(handle);
    }
}

#[async_trait]
impl TelemetryBatch for TelemetryPublishBatch {
    async fn publish_point(&mut self, point: &TelemetryPoint) -> DomainResult<()> {
        let payload = serde_json::to_vec(point).context("Failed to serialize point")?;
        let subject = format!("{}.points.{}", self.base_subject, point.device_id);
        self.track(subject, payload);
        Ok(())
    }

    async fn publish_alert(&mut self, alert: &TelemetryAlert) -> DomainResult<()> {
        let payload = serde_json::to_vec(alert).context("Failed to serialize alert")?;
        let subject = format!("{}.alerts.{}", self.base_subject, alert.device_id);
        self.track(subject, payload);
        Ok(())
    }

    async fn wait_until_published(&mut self) -> PublishSummary {
        let handles: Vec<_> = self.in_flight.drain(..).collect();
        let mut summary = PublishSummary::default();

        for handle in handles {
            match handle.await {
                Ok(Ok(())) => summary.published += 1,
                Ok(Err(err)) => {
                    warn!(error = %err, "Telemetry publish failed");
                    summary.failed += 1;
                }
                Err(err) => {
                    error!(error = %err, "Telemetry publish task panicked");
                    summary.failed += 1;
                }
            }
        }

        info!(
            published = summary.published,
            failed = summary.failed,
            "Drained in-flight telemetry publishes"
        );
        summary
    }
}

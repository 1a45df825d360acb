use anyhow::Context;
use async_nats::jetstream;
use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use helio_domain::error::DomainResult;

use crate::traits::JetStreamPublisher;

/// JetStream-backed publisher that awaits the broker acknowledgment for
/// every message
pub struct ContextPublisher {
    jetstream: jetstream::Context,
}

impl ContextPublisher {
    pub fn new(jetstream: jetstream::Context) -> Self {
        Self { jetstream }
    }
}

#[async_trait]
impl JetStreamPublisher for ContextPublisher {
    async fn publish(&self, subject: String, payload: Bytes) -> DomainResult<()> {
        debug!(
            subject = %subject,
            size_bytes = payload.len(),
            "Publishing telemetry message"
        );

        let ack = self
            .jetstream
            .publish(subject.clone(), payload)
            .await
            .context("Failed to publish message to JetStream")?;

        ack.await
            .context("Failed to receive JetStream acknowledgment")?;

        debug!(subject = %subject, "Successfully published and acknowledged");
        Ok(())
    }
}

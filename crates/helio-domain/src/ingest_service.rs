use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::error::{DomainError, DomainResult};
use crate::producer::TelemetryProducer;
use crate::provider::{DataProvider, FetchTelemetryInput, ProviderRegistry};
use crate::stores::{DeviceRegistry, SecretStore};
use crate::types::{Device, DeviceInfo, PublishSummary, Site};

/// Credential carried by an inbound job request: either the raw provider
/// token inline or a reference to a stored secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialRef {
    Token(String),
    Secret(String),
}

/// Domain service that orchestrates one job invocation
///
/// Flow:
/// 1. Resolve the credential (inline token or secret reference)
/// 2. Look up the provider adapter in the registry
/// 3. Run the requested operation against the provider
/// 4. For telemetry fetches, publish normalized payloads and drain the barrier
/// 5. On a not-found error during a telemetry fetch, deprecate the stale
///    device registration before re-raising
pub struct TelemetryIngestService {
    registry: Arc<ProviderRegistry>,
    secret_store: Arc<dyn SecretStore>,
    producer: Arc<dyn TelemetryProducer>,
    device_registry: Arc<dyn DeviceRegistry>,
}

impl TelemetryIngestService {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        secret_store: Arc<dyn SecretStore>,
        producer: Arc<dyn TelemetryProducer>,
        device_registry: Arc<dyn DeviceRegistry>,
    ) -> Self {
        Self {
            registry,
            secret_store,
            producer,
            device_registry,
        }
    }

    async fn resolve_credential(&self, credential: &CredentialRef) -> DomainResult<String> {
        match credential {
            CredentialRef::Token(token) => Ok(token.clone()),
            CredentialRef::Secret(name) => {
                debug!(secret = %name, "resolving credential from secret store");
                self.secret_store.access_secret(name).await
            }
        }
    }

    #[instrument(skip(self, credential), fields(provider = %provider))]
    pub async fn verify_token(
        &self,
        provider: DataProvider,
        credential: &CredentialRef,
    ) -> DomainResult<()> {
        let token = self.resolve_credential(credential).await?;
        let adapter = self.registry.adapter(provider)?;
        adapter.verify_token(&token).await
    }

    #[instrument(skip(self, credential), fields(provider = %provider))]
    pub async fn retrieve_sites(
        &self,
        provider: DataProvider,
        credential: &CredentialRef,
    ) -> DomainResult<Vec<Site>> {
        let token = self.resolve_credential(credential).await?;
        let adapter = self.registry.adapter(provider)?;

        let sites = adapter.retrieve_sites(&token).await?;
        info!(count = sites.len(), "retrieved sites");
        Ok(sites)
    }

    #[instrument(skip(self, credential), fields(provider = %provider, site_id = %site_id))]
    pub async fn retrieve_devices(
        &self,
        provider: DataProvider,
        credential: &CredentialRef,
        site_id: &str,
    ) -> DomainResult<Vec<Device>> {
        let token = self.resolve_credential(credential).await?;
        let adapter = self.registry.adapter(provider)?;

        let devices = adapter.retrieve_devices(&token, site_id).await?;
        info!(count = devices.len(), "retrieved devices");
        Ok(devices)
    }

    #[instrument(
        skip(self, credential),
        fields(provider = %provider, site_id = %site_id, device_id = %device_id)
    )]
    pub async fn retrieve_device_info(
        &self,
        provider: DataProvider,
        credential: &CredentialRef,
        site_id: &str,
        device_id: &str,
    ) -> DomainResult<DeviceInfo> {
        let token = self.resolve_credential(credential).await?;
        let adapter = self.registry.adapter(provider)?;
        adapter.retrieve_device_info(&token, site_id, device_id).await
    }

    /// Fetch measurements and publish them downstream.
    ///
    /// A not-found response from the provider means our registration is
    /// stale: the device is deprecated on the home platform exactly once,
    /// then the error is re-raised for the entry point to acknowledge.
    #[instrument(
        skip(self, credential, input),
        fields(provider = %input.data_provider, site_id = %input.site_id, device_id = %input.device_id)
    )]
    pub async fn fetch_telemetry_points(
        &self,
        credential: &CredentialRef,
        input: &FetchTelemetryInput,
    ) -> DomainResult<PublishSummary> {
        let token = self.resolve_credential(credential).await?;
        let adapter = self.registry.adapter(input.data_provider)?;

        let points = match adapter.fetch_telemetry_points(&token, input).await {
            Ok(points) => points,
            Err(err) => return Err(self.handle_stale_device(err, &input.device_id).await),
        };

        debug!(count = points.len(), "publishing telemetry points");
        let mut batch = self.producer.batch();
        for point in &points {
            if let Err(err) = batch.publish_point(point).await {
                // Drain what was already tracked so it is not abandoned
                batch.wait_until_published().await;
                return Err(err);
            }
        }

        let summary = batch.wait_until_published().await;
        info!(
            published = summary.published,
            failed = summary.failed,
            "telemetry point batch drained"
        );
        Ok(summary)
    }

    /// Fetch alerts and publish them downstream; same stale-device handling
    /// as the points path.
    #[instrument(
        skip(self, credential, input),
        fields(provider = %input.data_provider, site_id = %input.site_id, device_id = %input.device_id)
    )]
    pub async fn fetch_telemetry_alerts(
        &self,
        credential: &CredentialRef,
        input: &FetchTelemetryInput,
    ) -> DomainResult<PublishSummary> {
        let token = self.resolve_credential(credential).await?;
        let adapter = self.registry.adapter(input.data_provider)?;

        let alerts = match adapter.fetch_telemetry_alerts(&token, input).await {
            Ok(alerts) => alerts,
            Err(err) => return Err(self.handle_stale_device(err, &input.device_id).await),
        };

        debug!(count = alerts.len(), "publishing telemetry alerts");
        let mut batch = self.producer.batch();
        for alert in &alerts {
            if let Err(err) = batch.publish_alert(alert).await {
                batch.wait_until_published().await;
                return Err(err);
            }
        }

        let summary = batch.wait_until_published().await;
        info!(
            published = summary.published,
            failed = summary.failed,
            "telemetry alert batch drained"
        );
        Ok(summary)
    }

    async fn handle_stale_device(&self, err: DomainError, device_id: &str) -> DomainError {
        match &err {
            DomainError::DeviceNotFound(_) | DomainError::SiteNotFound(_) => {
                warn!(device_id = %device_id, "provider reports entity gone, deprecating device");
                if let Err(cleanup_err) = self.device_registry.deprecate_device(device_id).await {
                    // Cleanup failure must not mask the original not-found
                    warn!(
                        device_id = %device_id,
                        error = %cleanup_err,
                        "device deprecation failed"
                    );
                }
                err
            }
            _ => err,
        }
    }
}

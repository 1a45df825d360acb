use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::types::{Device, DeviceInfo, Site, TelemetryAlert, TelemetryPoint};

/// Third-party telemetry data providers known to the platform.
///
/// This is a closed set: requests carrying any other string fail
/// deserialization at the boundary instead of falling through silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataProvider {
    AlsoEnergy,
    Kmc,
}

impl std::fmt::Display for DataProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataProvider::AlsoEnergy => write!(f, "also_energy"),
            DataProvider::Kmc => write!(f, "kmc"),
        }
    }
}

/// Parameters for a telemetry fetch operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTelemetryInput {
    pub data_provider: DataProvider,
    pub site_id: String,
    pub device_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Uniform operation surface every concrete provider implements.
///
/// Adapters issue retried HTTP calls against the provider's API and map
/// provider-specific response shapes and status codes into the common
/// entity types and error taxonomy. Site and device lists are returned
/// sorted by name so output is stable across polling cycles.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Check that the given credential is accepted by the provider
    async fn verify_token(&self, credential: &str) -> DomainResult<()>;

    /// List all sites visible to the credential, sorted by name
    async fn retrieve_sites(&self, credential: &str) -> DomainResult<Vec<Site>>;

    /// List all devices of a site, sorted by name
    async fn retrieve_devices(&self, credential: &str, site_id: &str) -> DomainResult<Vec<Device>>;

    /// Fetch extended metadata for a single device
    async fn retrieve_device_info(
        &self,
        credential: &str,
        site_id: &str,
        device_id: &str,
    ) -> DomainResult<DeviceInfo>;

    /// Fetch measurements for a device over a time window
    async fn fetch_telemetry_points(
        &self,
        credential: &str,
        input: &FetchTelemetryInput,
    ) -> DomainResult<Vec<TelemetryPoint>>;

    /// Fetch alerts for a device over a time window
    async fn fetch_telemetry_alerts(
        &self,
        credential: &str,
        input: &FetchTelemetryInput,
    ) -> DomainResult<Vec<TelemetryAlert>>;
}

/// Registry dispatching a provider identifier to its adapter.
///
/// An unregistered provider is a missing adapter registration, i.e. a
/// programmer error, and fails fast with `ProviderNotSupported`.
#[derive(Default)]
pub struct ProviderRegistry {
    adapters: HashMap<DataProvider, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    pub fn register(mut self, provider: DataProvider, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(provider, adapter);
        self
    }

    pub fn adapter(&self, provider: DataProvider) -> DomainResult<Arc<dyn ProviderAdapter>> {
        self.adapters
            .get(&provider)
            .cloned()
            .ok_or_else(|| DomainError::ProviderNotSupported(provider.to_string()))
    }
}

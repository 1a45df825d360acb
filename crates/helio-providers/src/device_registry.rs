use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::info;

use helio_domain::error::{DomainError, DomainResult};
use helio_domain::stores::DeviceRegistry;

use crate::http::{build_client, transport_error};
use crate::retry::{retry, RetryPolicy};

#[derive(Debug, Serialize)]
struct DeprecateRequest<'a> {
    device_id: &'a str,
}

/// Device registry backed by the home platform's internal device API.
///
/// Deprecation is idempotent upstream, so a 404 for an already-removed
/// device is treated as success.
pub struct HttpDeviceRegistry {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HttpDeviceRegistry {
    pub fn new(base_url: String, timeout: Duration, retry: RetryPolicy) -> DomainResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url,
            retry,
        })
    }
}

#[async_trait]
impl DeviceRegistry for HttpDeviceRegistry {
    async fn deprecate_device(&self, device_id: &str) -> DomainResult<()> {
        let url = format!("{}/internal/devices/deprecate", self.base_url);
        let request = DeprecateRequest { device_id };

        let response = retry(
            &self.retry,
            "deprecate_device",
            DomainError::is_transport,
            || async {
                self.client
                    .post(&url)
                    .json(&request)
                    .send()
                    .await
                    .map_err(transport_error)
            },
        )
        .await?;

        match response.status() {
            status if status.is_success() => {
                info!(device_id = %device_id, "deprecated stale device");
                Ok(())
            }
            StatusCode::NOT_FOUND => {
                info!(device_id = %device_id, "device already removed");
                Ok(())
            }
            status => Err(DomainError::ProviderResponse(format!(
                "unexpected deprecate status {status}"
            ))),
        }
    }
}

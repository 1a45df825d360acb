use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use helio_domain::error::{DomainError, DomainResult};
use helio_domain::provider::{DataProvider, FetchTelemetryInput, ProviderAdapter};
use helio_domain::types::{
    AlertSeverity, Device, DeviceCategory, DeviceInfo, Site, TelemetryAlert, TelemetryPoint,
};
use helio_domain::Timer;

use crate::http::{build_client, read_json, transport_error};
use crate::retry::{retry, RetryPolicy};

/// Deployment parameters for the KMC Controls API
#[derive(Debug, Clone)]
pub struct KmcConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

// ---------------------------------------------------------------------------
// Upstream response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct LicenseRequest<'a> {
    api_key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    site_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct LicenseResponse {
    license: String,
}

#[derive(Debug, Deserialize)]
struct SiteRecord {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct DeviceRecord {
    id: String,
    name: String,
    device_type: String,
    #[serde(default)]
    serial: Option<String>,
    #[serde(default)]
    controller_id: Option<String>,
    #[serde(default)]
    driver: Option<String>,
    #[serde(default)]
    last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct TrendRecord {
    point: String,
    value: f64,
    observed_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct AlarmRecord {
    id: String,
    device_id: String,
    level: String,
    description: String,
    raised_at: DateTime<Utc>,
    #[serde(default)]
    cleared_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// KMC device type vocabulary mapped onto the common categories
fn category_for_device_type(device_type: &str) -> DeviceCategory {
    match device_type {
        "inverter" | "pv_inverter" => DeviceCategory::Inverter,
        "meter" | "power_meter" => DeviceCategory::Meter,
        "weather" | "weather_station" => DeviceCategory::WeatherStation,
        "battery" | "ess" => DeviceCategory::Battery,
        _ => DeviceCategory::Unknown,
    }
}

fn severity_for_level(level: &str) -> AlertSeverity {
    match level {
        "critical" | "fault" => AlertSeverity::Critical,
        "warning" => AlertSeverity::Warning,
        _ => AlertSeverity::Info,
    }
}

fn normalize_sites(records: Vec<SiteRecord>) -> Vec<Site> {
    let mut sites: Vec<Site> = records
        .into_iter()
        .map(|record| Site {
            id: record.id,
            name: record.name,
        })
        .collect();
    sites.sort_by(|a, b| a.name.cmp(&b.name));
    sites
}

fn normalize_devices(records: Vec<DeviceRecord>) -> Vec<Device> {
    let mut devices: Vec<Device> = records
        .into_iter()
        .map(|record| Device {
            id: record.id,
            name: record.name,
            category: category_for_device_type(&record.device_type),
        })
        .collect();
    devices.sort_by(|a, b| a.name.cmp(&b.name));
    devices
}

fn normalize_device_info(record: DeviceRecord) -> DeviceInfo {
    DeviceInfo {
        id: record.id,
        name: record.name,
        category: category_for_device_type(&record.device_type),
        serial_number: record.serial,
        gateway_id: record.controller_id,
        driver: record.driver,
        last_update: record.last_seen,
    }
}

fn points_from_trends(input: &FetchTelemetryInput, records: Vec<TrendRecord>) -> Vec<TelemetryPoint> {
    records
        .into_iter()
        .map(|record| TelemetryPoint {
            data_provider: DataProvider::Kmc,
            site_id: input.site_id.clone(),
            device_id: input.device_id.clone(),
            point_tag: record.point,
            value: record.value,
            measured_at: record.observed_at,
        })
        .collect()
}

fn alerts_from_alarms(input: &FetchTelemetryInput, records: Vec<AlarmRecord>) -> Vec<TelemetryAlert> {
    records
        .into_iter()
        .map(|record| TelemetryAlert {
            data_provider: DataProvider::Kmc,
            site_id: input.site_id.clone(),
            device_id: record.device_id,
            alert_id: record.id,
            severity: severity_for_level(&record.level),
            message: record.description,
            started_at: record.raised_at,
            ended_at: record.cleared_at,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// KMC Controls provider adapter.
///
/// KMC licenses are short-lived and site-scoped, so the raw API key is
/// exchanged on every call and the result is never cached; the token cache
/// only fronts providers whose tokens are account-scoped.
pub struct KmcAdapter {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl KmcAdapter {
    pub fn new(config: KmcConfig) -> DomainResult<Self> {
        Ok(Self {
            client: build_client(config.timeout)?,
            base_url: config.base_url,
            retry: config.retry,
        })
    }

    /// Exchange the API key for a license, scoped to a site when the
    /// operation targets one
    async fn license(&self, credential: &str, site_id: Option<&str>) -> DomainResult<String> {
        let url = format!("{}/license", self.base_url);
        let request = LicenseRequest {
            api_key: credential,
            site_id,
        };

        let response = retry(
            &self.retry,
            "kmc_license",
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
                let body: LicenseResponse = read_json(response).await?;
                Ok(body.license)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(
                DomainError::TokenUnauthorized("KMC rejected the API key".to_string()),
            ),
            StatusCode::NOT_FOUND => match site_id {
                Some(site_id) => Err(DomainError::SiteNotFound(site_id.to_string())),
                None => Err(DomainError::ProviderResponse(
                    "license endpoint not found".to_string(),
                )),
            },
            status => Err(DomainError::ProviderResponse(format!(
                "unexpected license status {status}"
            ))),
        }
    }

    async fn get_retried(
        &self,
        operation: &str,
        url: &str,
        license: &str,
    ) -> DomainResult<reqwest::Response> {
        retry(&self.retry, operation, DomainError::is_transport, || async {
            self.client
                .get(url)
                .header("X-Kmc-License", license)
                .send()
                .await
                .map_err(transport_error)
        })
        .await
    }

    fn unauthorized(status: StatusCode) -> bool {
        status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
    }
}

#[async_trait]
impl ProviderAdapter for KmcAdapter {
    async fn verify_token(&self, credential: &str) -> DomainResult<()> {
        // An unscoped license exchange is the verification
        self.license(credential, None).await.map(|_| ())
    }

    async fn retrieve_sites(&self, credential: &str) -> DomainResult<Vec<Site>> {
        let _timer = Timer::start("kmc_retrieve_sites");
        let license = self.license(credential, None).await?;
        let url = format!("{}/sites", self.base_url);

        let response = self.get_retried("kmc_sites", &url, &license).await?;
        match response.status() {
            status if status.is_success() => Ok(normalize_sites(read_json(response).await?)),
            status if Self::unauthorized(status) => Err(DomainError::TokenUnauthorized(
                "license rejected".to_string(),
            )),
            status => Err(DomainError::ProviderResponse(format!(
                "unexpected sites status {status}"
            ))),
        }
    }

    async fn retrieve_devices(&self, credential: &str, site_id: &str) -> DomainResult<Vec<Device>> {
        let _timer = Timer::start("kmc_retrieve_devices");
        let license = self.license(credential, Some(site_id)).await?;
        let url = format!("{}/sites/{}/devices", self.base_url, site_id);

        let response = self.get_retried("kmc_devices", &url, &license).await?;
        match response.status() {
            status if status.is_success() => Ok(normalize_devices(read_json(response).await?)),
            StatusCode::NOT_FOUND => Err(DomainError::SiteNotFound(site_id.to_string())),
            status if Self::unauthorized(status) => Err(DomainError::TokenUnauthorized(
                "license rejected".to_string(),
            )),
            status => Err(DomainError::ProviderResponse(format!(
                "unexpected devices status {status}"
            ))),
        }
    }

    async fn retrieve_device_info(
        &self,
        credential: &str,
        site_id: &str,
        device_id: &str,
    ) -> DomainResult<DeviceInfo> {
        let _timer = Timer::start("kmc_retrieve_device_info");
        let license = self.license(credential, Some(site_id)).await?;
        let url = format!("{}/sites/{}/devices/{}", self.base_url, site_id, device_id);

        let response = self.get_retried("kmc_device_info", &url, &license).await?;
        match response.status() {
            status if status.is_success() => Ok(normalize_device_info(read_json(response).await?)),
            StatusCode::NOT_FOUND => Err(DomainError::DeviceNotFound(device_id.to_string())),
            status if Self::unauthorized(status) => Err(DomainError::TokenUnauthorized(
                "license rejected".to_string(),
            )),
            status => Err(DomainError::ProviderResponse(format!(
                "unexpected device status {status}"
            ))),
        }
    }

    async fn fetch_telemetry_points(
        &self,
        credential: &str,
        input: &FetchTelemetryInput,
    ) -> DomainResult<Vec<TelemetryPoint>> {
        let _timer = Timer::start("kmc_fetch_points");
        let license = self.license(credential, Some(&input.site_id)).await?;
        let url = format!(
            "{}/sites/{}/devices/{}/trends?from={}&to={}",
            self.base_url,
            input.site_id,
            input.device_id,
            input.start.to_rfc3339(),
            input.end.to_rfc3339()
        );

        let response = self.get_retried("kmc_trends", &url, &license).await?;
        match response.status() {
            StatusCode::NO_CONTENT => Err(DomainError::DataUnavailable(format!(
                "no trends for device {} in window",
                input.device_id
            ))),
            status if status.is_success() => {
                let records: Vec<TrendRecord> = read_json(response).await?;
                if records.is_empty() {
                    return Err(DomainError::DataUnavailable(format!(
                        "no trends for device {} in window",
                        input.device_id
                    )));
                }
                Ok(points_from_trends(input, records))
            }
            StatusCode::NOT_FOUND => Err(DomainError::DeviceNotFound(input.device_id.clone())),
            status if Self::unauthorized(status) => Err(DomainError::TokenUnauthorized(
                "license rejected".to_string(),
            )),
            status => Err(DomainError::ProviderResponse(format!(
                "unexpected trends status {status}"
            ))),
        }
    }

    async fn fetch_telemetry_alerts(
        &self,
        credential: &str,
        input: &FetchTelemetryInput,
    ) -> DomainResult<Vec<TelemetryAlert>> {
        let _timer = Timer::start("kmc_fetch_alerts");
        let license = self.license(credential, Some(&input.site_id)).await?;
        let url = format!(
            "{}/sites/{}/alarms?from={}&to={}",
            self.base_url,
            input.site_id,
            input.start.to_rfc3339(),
            input.end.to_rfc3339()
        );

        let response = self.get_retried("kmc_alarms", &url, &license).await?;
        match response.status() {
            StatusCode::NO_CONTENT => Err(DomainError::DataUnavailable(format!(
                "no alarms for site {} in window",
                input.site_id
            ))),
            status if status.is_success() => {
                let records: Vec<AlarmRecord> = read_json(response).await?;
                Ok(alerts_from_alarms(input, records))
            }
            StatusCode::NOT_FOUND => Err(DomainError::SiteNotFound(input.site_id.clone())),
            status if Self::unauthorized(status) => Err(DomainError::TokenUnauthorized(
                "license rejected".to_string(),
            )),
            status => Err(DomainError::ProviderResponse(format!(
                "unexpected alarms status {status}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetch_input() -> FetchTelemetryInput {
        FetchTelemetryInput {
            data_provider: DataProvider::Kmc,
            site_id: "site-a".to_string(),
            device_id: "dev-1".to_string(),
            start: Utc::now() - chrono::Duration::minutes(15),
            end: Utc::now(),
        }
    }

    #[test]
    fn test_device_type_vocabulary() {
        assert_eq!(category_for_device_type("pv_inverter"), DeviceCategory::Inverter);
        assert_eq!(category_for_device_type("power_meter"), DeviceCategory::Meter);
        assert_eq!(category_for_device_type("ess"), DeviceCategory::Battery);
        assert_eq!(category_for_device_type("thermostat"), DeviceCategory::Unknown);
    }

    #[test]
    fn test_alarm_level_vocabulary() {
        assert_eq!(severity_for_level("fault"), AlertSeverity::Critical);
        assert_eq!(severity_for_level("warning"), AlertSeverity::Warning);
        assert_eq!(severity_for_level("notice"), AlertSeverity::Info);
    }

    #[test]
    fn test_sites_sorted_by_name() {
        let records = vec![
            SiteRecord {
                id: "b".to_string(),
                name: "Bravo Plant".to_string(),
            },
            SiteRecord {
                id: "a".to_string(),
                name: "Alpha Plant".to_string(),
            },
        ];

        let sites = normalize_sites(records);
        assert_eq!(sites[0].name, "Alpha Plant");
        assert_eq!(sites[1].name, "Bravo Plant");
    }

    #[test]
    fn test_trends_carry_fetch_scope() {
        let input = fetch_input();
        let observed_at = Utc::now();
        let records = vec![TrendRecord {
            point: "ac_power".to_string(),
            value: 88.0,
            observed_at,
        }];

        let points = points_from_trends(&input, records);
        assert_eq!(points[0].data_provider, DataProvider::Kmc);
        assert_eq!(points[0].site_id, "site-a");
        assert_eq!(points[0].device_id, "dev-1");
        assert_eq!(points[0].point_tag, "ac_power");
        assert_eq!(points[0].value, 88.0);
    }

    #[test]
    fn test_alarms_keep_their_own_device_id() {
        let input = fetch_input();
        let raised_at = Utc::now();
        let records = vec![AlarmRecord {
            id: "alarm-9".to_string(),
            device_id: "dev-2".to_string(),
            level: "critical".to_string(),
            description: "meter offline".to_string(),
            raised_at,
            cleared_at: None,
        }];

        let alerts = alerts_from_alarms(&input, records);
        // Alarms come back site-wide, each one names its own device
        assert_eq!(alerts[0].device_id, "dev-2");
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
        assert!(alerts[0].ended_at.is_none());
    }

    #[test]
    fn test_license_request_omits_absent_site_scope() {
        let scoped = serde_json::to_value(LicenseRequest {
            api_key: "key123",
            site_id: Some("site-a"),
        })
        .unwrap();
        assert_eq!(scoped["site_id"], "site-a");

        let unscoped = serde_json::to_value(LicenseRequest {
            api_key: "key123",
            site_id: None,
        })
        .unwrap();
        assert!(unscoped.get("site_id").is_none());
    }

    #[test]
    fn test_device_record_parses_sparse_body() {
        let body = serde_json::json!({
            "id": "dev-1",
            "name": "Inverter 1",
            "device_type": "inverter"
        });

        let record: DeviceRecord = serde_json::from_value(body).unwrap();
        let info = normalize_device_info(record);
        assert_eq!(info.category, DeviceCategory::Inverter);
        assert!(info.serial_number.is_none());
        assert!(info.last_update.is_none());
    }
}

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use helio_cache::{TokenCache, TokenFetcher};
use helio_domain::error::{DomainError, DomainResult};
use helio_domain::provider::{DataProvider, FetchTelemetryInput, ProviderAdapter};
use helio_domain::types::{
    AlertSeverity, Device, DeviceCategory, DeviceInfo, Site, TelemetryAlert, TelemetryPoint,
};
use helio_domain::Timer;

use crate::http::{build_client, read_json, transport_error};
use crate::retry::{retry, RetryPolicy};

/// Deployment parameters for the AlsoEnergy API
#[derive(Debug, Clone)]
pub struct AlsoEnergyConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

// ---------------------------------------------------------------------------
// Upstream response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequest {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SiteRecord {
    site_id: i64,
    site_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardwareRecord {
    hardware_id: i64,
    name: String,
    function_code: String,
    #[serde(default)]
    serial_number: Option<String>,
    #[serde(default)]
    gateway_id: Option<i64>,
    #[serde(default)]
    driver_name: Option<String>,
    #[serde(default)]
    last_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BinDataRequest {
    site_id: String,
    hardware_id: String,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinDataResponse {
    #[serde(default)]
    items: Vec<BinDataItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinDataItem {
    timestamp: DateTime<Utc>,
    #[serde(default)]
    data: BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlertRecord {
    alert_id: i64,
    hardware_id: i64,
    severity: i32,
    message: String,
    start_time: DateTime<Utc>,
    #[serde(default)]
    end_time: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// AlsoEnergy hardware function codes mapped onto the common categories
fn category_for_function_code(code: &str) -> DeviceCategory {
    match code {
        "Inverter" | "StringInverter" | "CentralInverter" => DeviceCategory::Inverter,
        "ProductionMeter" | "RevenueMeter" | "Meter" => DeviceCategory::Meter,
        "WeatherStation" => DeviceCategory::WeatherStation,
        "Battery" | "BatteryInverter" => DeviceCategory::Battery,
        _ => DeviceCategory::Unknown,
    }
}

fn severity_for_code(code: i32) -> AlertSeverity {
    match code {
        i32::MIN..=1 => AlertSeverity::Info,
        2 => AlertSeverity::Warning,
        _ => AlertSeverity::Critical,
    }
}

fn normalize_sites(records: Vec<SiteRecord>) -> Vec<Site> {
    let mut sites: Vec<Site> = records
        .into_iter()
        .map(|record| Site {
            id: record.site_id.to_string(),
            name: record.site_name,
        })
        .collect();
    sites.sort_by(|a, b| a.name.cmp(&b.name));
    sites
}

fn normalize_devices(records: Vec<HardwareRecord>) -> Vec<Device> {
    let mut devices: Vec<Device> = records
        .into_iter()
        .map(|record| Device {
            id: record.hardware_id.to_string(),
            name: record.name,
            category: category_for_function_code(&record.function_code),
        })
        .collect();
    devices.sort_by(|a, b| a.name.cmp(&b.name));
    devices
}

fn normalize_device_info(record: HardwareRecord) -> DeviceInfo {
    DeviceInfo {
        id: record.hardware_id.to_string(),
        name: record.name,
        category: category_for_function_code(&record.function_code),
        serial_number: record.serial_number,
        gateway_id: record.gateway_id.map(|id| id.to_string()),
        driver: record.driver_name,
        last_update: record.last_update,
    }
}

fn points_from_bins(input: &FetchTelemetryInput, items: Vec<BinDataItem>) -> Vec<TelemetryPoint> {
    items
        .into_iter()
        .flat_map(|item| {
            let measured_at = item.timestamp;
            item.data.into_iter().map(move |(tag, value)| TelemetryPoint {
                data_provider: DataProvider::AlsoEnergy,
                site_id: input.site_id.clone(),
                device_id: input.device_id.clone(),
                point_tag: tag,
                value,
                measured_at,
            })
        })
        .collect()
}

fn alerts_from_records(input: &FetchTelemetryInput, records: Vec<AlertRecord>) -> Vec<TelemetryAlert> {
    records
        .into_iter()
        .map(|record| TelemetryAlert {
            data_provider: DataProvider::AlsoEnergy,
            site_id: input.site_id.clone(),
            device_id: record.hardware_id.to_string(),
            alert_id: record.alert_id.to_string(),
            severity: severity_for_code(record.severity),
            message: record.message,
            started_at: record.start_time,
            ended_at: record.end_time,
        })
        .collect()
}

/// Decode the basic-auth-style credential (`base64("user:password")`) used
/// by AlsoEnergy into its parts
fn decode_credential(credential: &str) -> DomainResult<(String, String)> {
    let decoded = STANDARD
        .decode(credential)
        .map_err(|_| DomainError::ValidationError("credential is not valid base64".to_string()))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|_| DomainError::ValidationError("credential is not valid UTF-8".to_string()))?;

    match decoded.split_once(':') {
        Some((username, password)) if !username.is_empty() => {
            Ok((username.to_string(), password.to_string()))
        }
        _ => Err(DomainError::ValidationError(
            "credential must decode to username:password".to_string(),
        )),
    }
}

// ---------------------------------------------------------------------------
// Token exchange
// ---------------------------------------------------------------------------

/// Exchanges the decoded username/password for a bearer access token.
/// The token cache composes around this fetcher at every call site.
pub struct AlsoEnergyTokenFetcher {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

#[async_trait]
impl TokenFetcher for AlsoEnergyTokenFetcher {
    async fn fetch_token(&self, credential: &str) -> DomainResult<String> {
        let (username, password) = decode_credential(credential)?;
        let url = format!("{}/Auth/token", self.base_url);

        let response = retry(
            &self.retry,
            "also_energy_auth",
            DomainError::is_transport,
            || async {
                self.client
                    .post(&url)
                    .json(&TokenRequest {
                        username: username.clone(),
                        password: password.clone(),
                    })
                    .send()
                    .await
                    .map_err(transport_error)
            },
        )
        .await?;

        match response.status() {
            status if status.is_success() => {
                let body: TokenResponse = read_json(response).await?;
                Ok(body.access_token)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(
                DomainError::TokenUnauthorized("AlsoEnergy rejected the credential".to_string()),
            ),
            status => Err(DomainError::ProviderResponse(format!(
                "unexpected auth status {status}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// AlsoEnergy provider adapter.
///
/// Auth is account-scoped: the decoded credential is exchanged once for a
/// bearer token and memoized through the token cache; every read then
/// carries the bearer and is retried per the policy.
pub struct AlsoEnergyAdapter {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
    token_cache: Arc<TokenCache>,
    token_fetcher: AlsoEnergyTokenFetcher,
}

impl AlsoEnergyAdapter {
    pub fn new(config: AlsoEnergyConfig, token_cache: Arc<TokenCache>) -> DomainResult<Self> {
        let client = build_client(config.timeout)?;
        let token_fetcher = AlsoEnergyTokenFetcher {
            client: client.clone(),
            base_url: config.base_url.clone(),
            retry: config.retry.clone(),
        };

        Ok(Self {
            client,
            base_url: config.base_url,
            retry: config.retry,
            token_cache,
            token_fetcher,
        })
    }

    async fn bearer(&self, credential: &str) -> DomainResult<String> {
        self.token_cache
            .get_or_fetch(credential, &self.token_fetcher)
            .await
    }

    async fn get_retried(
        &self,
        operation: &str,
        url: &str,
        bearer: &str,
    ) -> DomainResult<reqwest::Response> {
        retry(&self.retry, operation, DomainError::is_transport, || async {
            self.client
                .get(url)
                .bearer_auth(bearer)
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
impl ProviderAdapter for AlsoEnergyAdapter {
    async fn verify_token(&self, credential: &str) -> DomainResult<()> {
        // A successful token exchange is the verification
        self.bearer(credential).await.map(|_| ())
    }

    async fn retrieve_sites(&self, credential: &str) -> DomainResult<Vec<Site>> {
        let _timer = Timer::start("also_energy_retrieve_sites");
        let bearer = self.bearer(credential).await?;
        let url = format!("{}/Sites", self.base_url);

        let response = self.get_retried("also_energy_sites", &url, &bearer).await?;
        match response.status() {
            status if status.is_success() => Ok(normalize_sites(read_json(response).await?)),
            status if Self::unauthorized(status) => Err(DomainError::TokenUnauthorized(
                "bearer token rejected".to_string(),
            )),
            status => Err(DomainError::ProviderResponse(format!(
                "unexpected sites status {status}"
            ))),
        }
    }

    async fn retrieve_devices(&self, credential: &str, site_id: &str) -> DomainResult<Vec<Device>> {
        let _timer = Timer::start("also_energy_retrieve_devices");
        let bearer = self.bearer(credential).await?;
        let url = format!("{}/Sites/{}/Hardware", self.base_url, site_id);

        let response = self
            .get_retried("also_energy_devices", &url, &bearer)
            .await?;
        match response.status() {
            status if status.is_success() => Ok(normalize_devices(read_json(response).await?)),
            StatusCode::NOT_FOUND => Err(DomainError::SiteNotFound(site_id.to_string())),
            status if Self::unauthorized(status) => Err(DomainError::TokenUnauthorized(
                "bearer token rejected".to_string(),
            )),
            status => Err(DomainError::ProviderResponse(format!(
                "unexpected hardware status {status}"
            ))),
        }
    }

    async fn retrieve_device_info(
        &self,
        credential: &str,
        site_id: &str,
        device_id: &str,
    ) -> DomainResult<DeviceInfo> {
        let _timer = Timer::start("also_energy_retrieve_device_info");
        let bearer = self.bearer(credential).await?;
        let url = format!(
            "{}/Hardware/{}?siteId={}",
            self.base_url, device_id, site_id
        );

        let response = self
            .get_retried("also_energy_device_info", &url, &bearer)
            .await?;
        match response.status() {
            status if status.is_success() => Ok(normalize_device_info(read_json(response).await?)),
            StatusCode::NOT_FOUND => Err(DomainError::DeviceNotFound(device_id.to_string())),
            status if Self::unauthorized(status) => Err(DomainError::TokenUnauthorized(
                "bearer token rejected".to_string(),
            )),
            status => Err(DomainError::ProviderResponse(format!(
                "unexpected hardware status {status}"
            ))),
        }
    }

    async fn fetch_telemetry_points(
        &self,
        credential: &str,
        input: &FetchTelemetryInput,
    ) -> DomainResult<Vec<TelemetryPoint>> {
        let _timer = Timer::start("also_energy_fetch_points");
        let bearer = self.bearer(credential).await?;
        let url = format!("{}/v2/Data/BinData", self.base_url);
        let request = BinDataRequest {
            site_id: input.site_id.clone(),
            hardware_id: input.device_id.clone(),
            from: input.start,
            to: input.end,
        };

        let response = retry(
            &self.retry,
            "also_energy_bin_data",
            DomainError::is_transport,
            || async {
                self.client
                    .post(&url)
                    .bearer_auth(&bearer)
                    .json(&request)
                    .send()
                    .await
                    .map_err(transport_error)
            },
        )
        .await?;

        match response.status() {
            StatusCode::NO_CONTENT => Err(DomainError::DataUnavailable(format!(
                "no bin data for device {} in window",
                input.device_id
            ))),
            status if status.is_success() => {
                let body: BinDataResponse = read_json(response).await?;
                if body.items.is_empty() {
                    return Err(DomainError::DataUnavailable(format!(
                        "no bin data for device {} in window",
                        input.device_id
                    )));
                }
                Ok(points_from_bins(input, body.items))
            }
            StatusCode::NOT_FOUND => Err(DomainError::DeviceNotFound(input.device_id.clone())),
            status if Self::unauthorized(status) => Err(DomainError::TokenUnauthorized(
                "bearer token rejected".to_string(),
            )),
            status => Err(DomainError::ProviderResponse(format!(
                "unexpected bin data status {status}"
            ))),
        }
    }

    async fn fetch_telemetry_alerts(
        &self,
        credential: &str,
        input: &FetchTelemetryInput,
    ) -> DomainResult<Vec<TelemetryAlert>> {
        let _timer = Timer::start("also_energy_fetch_alerts");
        let bearer = self.bearer(credential).await?;
        let url = format!(
            "{}/Sites/{}/Alerts?from={}&to={}",
            self.base_url,
            input.site_id,
            input.start.to_rfc3339(),
            input.end.to_rfc3339()
        );

        let response = self.get_retried("also_energy_alerts", &url, &bearer).await?;
        match response.status() {
            StatusCode::NO_CONTENT => Err(DomainError::DataUnavailable(format!(
                "no alerts for site {} in window",
                input.site_id
            ))),
            status if status.is_success() => {
                let records: Vec<AlertRecord> = read_json(response).await?;
                Ok(alerts_from_records(input, records))
            }
            StatusCode::NOT_FOUND => Err(DomainError::SiteNotFound(input.site_id.clone())),
            status if Self::unauthorized(status) => Err(DomainError::TokenUnauthorized(
                "bearer token rejected".to_string(),
            )),
            status => Err(DomainError::ProviderResponse(format!(
                "unexpected alerts status {status}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetch_input() -> FetchTelemetryInput {
        FetchTelemetryInput {
            data_provider: DataProvider::AlsoEnergy,
            site_id: "100".to_string(),
            device_id: "200".to_string(),
            start: Utc::now() - chrono::Duration::minutes(15),
            end: Utc::now(),
        }
    }

    #[test]
    fn test_decode_credential_round_trip() {
        let encoded = STANDARD.encode("userA:passA");
        let (username, password) = decode_credential(&encoded).unwrap();
        assert_eq!(username, "userA");
        assert_eq!(password, "passA");
    }

    #[test]
    fn test_decode_credential_password_may_contain_colon() {
        let encoded = STANDARD.encode("userA:pa:ss");
        let (_, password) = decode_credential(&encoded).unwrap();
        assert_eq!(password, "pa:ss");
    }

    #[test]
    fn test_decode_credential_rejects_garbage() {
        assert!(matches!(
            decode_credential("!!not-base64!!"),
            Err(DomainError::ValidationError(_))
        ));
        assert!(matches!(
            decode_credential(&STANDARD.encode("no-separator")),
            Err(DomainError::ValidationError(_))
        ));
    }

    #[test]
    fn test_sites_sorted_by_name_regardless_of_upstream_order() {
        let records = vec![
            SiteRecord {
                site_id: 3,
                site_name: "Zenith Farm".to_string(),
            },
            SiteRecord {
                site_id: 1,
                site_name: "Alpine Array".to_string(),
            },
            SiteRecord {
                site_id: 2,
                site_name: "Mesa Park".to_string(),
            },
        ];

        let sites = normalize_sites(records);
        let names: Vec<&str> = sites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Alpine Array", "Mesa Park", "Zenith Farm"]);
        assert_eq!(sites[0].id, "1");
    }

    #[test]
    fn test_devices_sorted_and_categorized() {
        let records = vec![
            HardwareRecord {
                hardware_id: 20,
                name: "Meter B".to_string(),
                function_code: "RevenueMeter".to_string(),
                serial_number: None,
                gateway_id: None,
                driver_name: None,
                last_update: None,
            },
            HardwareRecord {
                hardware_id: 10,
                name: "Inverter A".to_string(),
                function_code: "StringInverter".to_string(),
                serial_number: None,
                gateway_id: None,
                driver_name: None,
                last_update: None,
            },
        ];

        let devices = normalize_devices(records);
        assert_eq!(devices[0].name, "Inverter A");
        assert_eq!(devices[0].category, DeviceCategory::Inverter);
        assert_eq!(devices[1].category, DeviceCategory::Meter);
    }

    #[test]
    fn test_unknown_function_code_maps_to_unknown() {
        assert_eq!(
            category_for_function_code("FlowCapacitor"),
            DeviceCategory::Unknown
        );
        assert_eq!(
            category_for_function_code("WeatherStation"),
            DeviceCategory::WeatherStation
        );
        assert_eq!(category_for_function_code("Battery"), DeviceCategory::Battery);
    }

    #[test]
    fn test_device_info_missing_fields_are_explicit_none() {
        let record = HardwareRecord {
            hardware_id: 200,
            name: "Inverter A".to_string(),
            function_code: "Inverter".to_string(),
            serial_number: Some("SN-1".to_string()),
            gateway_id: None,
            driver_name: None,
            last_update: None,
        };

        let info = normalize_device_info(record);
        assert_eq!(info.serial_number.as_deref(), Some("SN-1"));
        assert!(info.gateway_id.is_none());
        assert!(info.driver.is_none());
        assert!(info.last_update.is_none());
    }

    #[test]
    fn test_points_flatten_bin_items_per_tag() {
        let input = fetch_input();
        let timestamp = Utc::now();
        let mut data = BTreeMap::new();
        data.insert("KW".to_string(), 41.5);
        data.insert("KWHnet".to_string(), 1203.0);

        let points = points_from_bins(&input, vec![BinDataItem { timestamp, data }]);

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].point_tag, "KW");
        assert_eq!(points[0].value, 41.5);
        assert_eq!(points[0].site_id, "100");
        assert_eq!(points[0].device_id, "200");
        assert_eq!(points[1].point_tag, "KWHnet");
    }

    #[test]
    fn test_alert_severity_mapping() {
        assert_eq!(severity_for_code(0), AlertSeverity::Info);
        assert_eq!(severity_for_code(2), AlertSeverity::Warning);
        assert_eq!(severity_for_code(5), AlertSeverity::Critical);
    }

    #[test]
    fn test_alerts_normalized_with_open_interval() {
        let input = fetch_input();
        let started = Utc::now();
        let records = vec![AlertRecord {
            alert_id: 7,
            hardware_id: 200,
            severity: 3,
            message: "inverter offline".to_string(),
            start_time: started,
            end_time: None,
        }];

        let alerts = alerts_from_records(&input, records);
        assert_eq!(alerts[0].alert_id, "7");
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
        assert!(alerts[0].ended_at.is_none());
    }

    #[test]
    fn test_bin_data_response_parses_upstream_shape() {
        let body = serde_json::json!({
            "items": [
                { "timestamp": "2026-08-01T12:00:00Z", "data": { "KW": 12.5 } },
                { "timestamp": "2026-08-01T12:15:00Z", "data": { "KW": 13.0 } }
            ]
        });

        let parsed: BinDataResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.items.len(), 2);
        assert_eq!(parsed.items[0].data["KW"], 12.5);
    }
}

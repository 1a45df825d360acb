use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device categories shared by all providers.
///
/// Provider-specific hardware vocabularies are mapped onto this closed set
/// via lookup tables in the adapter crates; anything unmapped lands on
/// `Unknown` rather than being dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceCategory {
    Inverter,
    Meter,
    WeatherStation,
    Battery,
    Unknown,
}

/// Normalized read-only projection of a provider site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: String,
    pub name: String,
}

/// Normalized read-only projection of a provider device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub category: DeviceCategory,
}

/// Extended device metadata.
///
/// Not every provider can supply every field, so the optional fields are an
/// explicit `None` rather than being omitted from the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub category: DeviceCategory,
    pub serial_number: Option<String>,
    pub gateway_id: Option<String>,
    pub driver: Option<String>,
    pub last_update: Option<DateTime<Utc>>,
}

/// Normalized telemetry measurement, the common schema every adapter
/// produces regardless of upstream shape. Immutable once constructed;
/// flows once through the producer to downstream ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPoint {
    pub data_provider: crate::provider::DataProvider,
    pub site_id: String,
    pub device_id: String,
    pub point_tag: String,
    pub value: f64,
    pub measured_at: DateTime<Utc>,
}

/// Severity of a provider alert, normalized across providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// Normalized provider alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryAlert {
    pub data_provider: crate::provider::DataProvider,
    pub site_id: String,
    pub device_id: String,
    pub alert_id: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Outcome of draining the publish barrier.
///
/// Individual publish failures are logged, counted, and never abort the
/// rest of the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishSummary {
    pub published: usize,
    pub failed: usize,
}

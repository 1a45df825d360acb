use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use helio_domain::error::DomainError;
use helio_domain::ingest_service::TelemetryIngestService;
use helio_domain::types::PublishSummary;
use helio_domain::validate::validate_struct;

use crate::error::{ApiError, ApiResult};
use crate::requests::{
    DeviceInfoRequest, DevicesRequest, SitesRequest, TelemetryRequest, VerifyTokenRequest,
};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TelemetryIngestService>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct TelemetryResponse {
    pub message: String,
    pub published: usize,
    pub failed: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health/ping", get(ping))
        .route("/jobs/verify-token", post(verify_token))
        .route("/jobs/sites", post(sites))
        .route("/jobs/devices", post(devices))
        .route("/jobs/device-info", post(device_info))
        .route("/jobs/telemetry/points", post(telemetry_points))
        .route("/jobs/telemetry/alerts", post(telemetry_alerts))
        .with_state(state)
}

/// GET /health/ping - Simple pong response
async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

/// POST /jobs/verify-token
async fn verify_token(
    State(state): State<AppState>,
    Json(request): Json<VerifyTokenRequest>,
) -> ApiResult<Json<MessageResponse>> {
    validate_struct(&request)?;
    let credential = request.credential.credential_ref()?;

    state
        .service
        .verify_token(request.data_provider, &credential)
        .await?;

    Ok(Json(MessageResponse {
        message: "token verified".to_string(),
    }))
}

/// POST /jobs/sites
async fn sites(
    State(state): State<AppState>,
    Json(request): Json<SitesRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_struct(&request)?;
    let credential = request.credential.credential_ref()?;

    let sites = state
        .service
        .retrieve_sites(request.data_provider, &credential)
        .await?;

    Ok(Json(sites))
}

/// POST /jobs/devices
async fn devices(
    State(state): State<AppState>,
    Json(request): Json<DevicesRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_struct(&request)?;
    let credential = request.credential.credential_ref()?;

    let devices = state
        .service
        .retrieve_devices(request.data_provider, &credential, &request.site_id)
        .await?;

    Ok(Json(devices))
}

/// POST /jobs/device-info
async fn device_info(
    State(state): State<AppState>,
    Json(request): Json<DeviceInfoRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_struct(&request)?;
    let credential = request.credential.credential_ref()?;

    let info = state
        .service
        .retrieve_device_info(
            request.data_provider,
            &credential,
            &request.site_id,
            &request.device_id,
        )
        .await?;

    Ok(Json(info))
}

/// POST /jobs/telemetry/points
async fn telemetry_points(
    State(state): State<AppState>,
    Json(request): Json<TelemetryRequest>,
) -> ApiResult<Json<TelemetryResponse>> {
    validate_struct(&request)?;
    request.window()?;
    let credential = request.credential.credential_ref()?;
    let input = request.to_input();

    let result = state.service.fetch_telemetry_points(&credential, &input).await;
    telemetry_response("telemetry points published", result)
}

/// POST /jobs/telemetry/alerts
async fn telemetry_alerts(
    State(state): State<AppState>,
    Json(request): Json<TelemetryRequest>,
) -> ApiResult<Json<TelemetryResponse>> {
    validate_struct(&request)?;
    request.window()?;
    let credential = request.credential.credential_ref()?;
    let input = request.to_input();

    let result = state.service.fetch_telemetry_alerts(&credential, &input).await;
    telemetry_response("telemetry alerts published", result)
}

/// An empty provider window is a normal outcome for an acknowledging
/// scheduler, not a failure: report it as 200 with zero publishes so the
/// job is not redelivered.
fn telemetry_response(
    ok_message: &str,
    result: Result<PublishSummary, DomainError>,
) -> ApiResult<Json<TelemetryResponse>> {
    match result {
        Ok(summary) => Ok(Json(TelemetryResponse {
            message: ok_message.to_string(),
            published: summary.published,
            failed: summary.failed,
        })),
        Err(DomainError::DataUnavailable(message)) => Ok(Json(TelemetryResponse {
            message,
            published: 0,
            failed: 0,
        })),
        Err(err) => Err(ApiError::from(err)),
    }
}

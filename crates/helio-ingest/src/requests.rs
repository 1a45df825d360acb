use chrono::{DateTime, Utc};
use garde::Validate;
use serde::Deserialize;

use helio_domain::error::{DomainError, DomainResult};
use helio_domain::ingest_service::CredentialRef;
use helio_domain::provider::{DataProvider, FetchTelemetryInput};

/// Credential fields shared by every job request: exactly one of `token`
/// (inline) or `token_secret` (stored reference) must be present.
#[derive(Debug, Deserialize, Validate)]
pub struct Credential {
    #[garde(inner(length(min = 1)))]
    pub token: Option<String>,
    #[garde(inner(length(min = 1)))]
    pub token_secret: Option<String>,
}

impl Credential {
    pub fn credential_ref(&self) -> DomainResult<CredentialRef> {
        match (&self.token, &self.token_secret) {
            (Some(token), None) => Ok(CredentialRef::Token(token.clone())),
            (None, Some(secret)) => Ok(CredentialRef::Secret(secret.clone())),
            _ => Err(DomainError::ValidationError(
                "exactly one of token or token_secret is required".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyTokenRequest {
    #[garde(skip)]
    pub data_provider: DataProvider,
    #[garde(dive)]
    #[serde(flatten)]
    pub credential: Credential,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SitesRequest {
    #[garde(skip)]
    pub data_provider: DataProvider,
    #[garde(dive)]
    #[serde(flatten)]
    pub credential: Credential,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DevicesRequest {
    #[garde(skip)]
    pub data_provider: DataProvider,
    #[garde(dive)]
    #[serde(flatten)]
    pub credential: Credential,
    #[garde(length(min = 1))]
    pub site_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DeviceInfoRequest {
    #[garde(skip)]
    pub data_provider: DataProvider,
    #[garde(dive)]
    #[serde(flatten)]
    pub credential: Credential,
    #[garde(length(min = 1))]
    pub site_id: String,
    #[garde(length(min = 1))]
    pub device_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TelemetryRequest {
    #[garde(skip)]
    pub data_provider: DataProvider,
    #[garde(dive)]
    #[serde(flatten)]
    pub credential: Credential,
    #[garde(length(min = 1))]
    pub site_id: String,
    #[garde(length(min = 1))]
    pub device_id: String,
    #[garde(skip)]
    pub start: DateTime<Utc>,
    #[garde(skip)]
    pub end: DateTime<Utc>,
}

impl TelemetryRequest {
    /// Window ordering is a semantic check garde's field rules cannot
    /// express; validated alongside them in the handler
    pub fn window(&self) -> DomainResult<()> {
        if self.start >= self.end {
            return Err(DomainError::ValidationError(
                "start must be before end".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_input(&self) -> FetchTelemetryInput {
        FetchTelemetryInput {
            data_provider: self.data_provider,
            site_id: self.site_id.clone(),
            device_id: self.device_id.clone(),
            start: self.start,
            end: self.end,
        }
    }
}

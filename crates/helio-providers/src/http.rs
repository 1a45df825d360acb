use std::time::Duration;

use helio_domain::error::{DomainError, DomainResult};

/// Build the shared reqwest client with the fixed per-request timeout.
///
/// One client per adapter, constructed once at service startup and reused;
/// there is no caller-supplied cancellation, a hung request is bounded by
/// this timeout and ultimately by the platform's execution timeout.
pub fn build_client(timeout: Duration) -> DomainResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| DomainError::ProviderTransport(format!("http client build: {err}")))
}

/// Map a reqwest failure (connect error, timeout, broken body) into the
/// retryable transport class
pub fn transport_error(err: reqwest::Error) -> DomainError {
    DomainError::ProviderTransport(err.to_string())
}

/// Decode a typed JSON body, mapping parse failures to the non-retryable
/// response class
pub async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> DomainResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|err| DomainError::ProviderResponse(format!("malformed provider body: {err}")))
}

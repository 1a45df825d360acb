use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use helio_domain::error::DomainError;

/// HTTP-facing error: a status code and a `{"message": ...}` body.
///
/// Internal failure detail is logged, not returned, so the body never
/// leaks store or transport internals.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let status = match &err {
            DomainError::ValidationError(_) => StatusCode::BAD_REQUEST,
            DomainError::TokenUnauthorized(_) => StatusCode::UNAUTHORIZED,
            DomainError::SiteNotFound(_) | DomainError::DeviceNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            // DataUnavailable is resolved to 200 in the handlers; reaching
            // here means a path forgot to, and 500 is the honest answer
            DomainError::DataUnavailable(_)
            | DomainError::ProviderNotSupported(_)
            | DomainError::ProviderTransport(_)
            | DomainError::ProviderResponse(_)
            | DomainError::RepositoryError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %err, "job failed");
            "internal error".to_string()
        } else {
            err.to_string()
        };

        Self { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                message: self.message,
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                DomainError::ValidationError("bad".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                DomainError::TokenUnauthorized("no".to_string()),
                StatusCode::UNAUTHORIZED,
            ),
            (
                DomainError::SiteNotFound("s".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                DomainError::DeviceNotFound("d".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                DomainError::ProviderNotSupported("x".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                DomainError::ProviderTransport("reset".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status, expected);
        }
    }

    #[test]
    fn test_internal_errors_do_not_leak_detail() {
        let err = ApiError::from(DomainError::RepositoryError(anyhow::anyhow!(
            "kv bucket misconfigured at nats://10.0.0.5"
        )));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "internal error");
    }
}

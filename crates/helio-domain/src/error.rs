use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Token unauthorized: {0}")]
    TokenUnauthorized(String),

    #[error("Site not found: {0}")]
    SiteNotFound(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("No data available: {0}")]
    DataUnavailable(String),

    #[error("Provider not supported: {0}")]
    ProviderNotSupported(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Provider transport error: {0}")]
    ProviderTransport(String),

    #[error("Provider response error: {0}")]
    ProviderResponse(String),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}

impl DomainError {
    /// Transport-level failures are the only class the retry policy acts on.
    pub fn is_transport(&self) -> bool {
        matches!(self, DomainError::ProviderTransport(_))
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

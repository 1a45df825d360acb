use async_trait::async_trait;
use tracing::debug;

use helio_domain::error::{DomainError, DomainResult};
use helio_domain::stores::SecretStore;

const SECRET_PREFIX: &str = "HELIO_SECRET_";

/// Secret store over process environment variables.
///
/// A request referencing `token_secret: "ae-prod"` resolves to the
/// `HELIO_SECRET_AE_PROD` variable. Deployments inject these from the
/// platform secret manager.
#[derive(Default)]
pub struct EnvSecretStore;

impl EnvSecretStore {
    pub fn new() -> Self {
        Self
    }

    fn var_name(name: &str) -> String {
        let suffix: String = name
            .chars()
            .map(|c| match c {
                'a'..='z' => c.to_ascii_uppercase(),
                '-' | '.' => '_',
                other => other,
            })
            .collect();
        format!("{}{}", SECRET_PREFIX, suffix)
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn access_secret(&self, name: &str) -> DomainResult<String> {
        let var = Self::var_name(name);
        debug!(secret = %name, "resolving secret from environment");

        std::env::var(&var).map_err(|_| {
            DomainError::ValidationError(format!("unknown secret reference: {name}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_name_mapping() {
        assert_eq!(EnvSecretStore::var_name("ae-prod"), "HELIO_SECRET_AE_PROD");
        assert_eq!(
            EnvSecretStore::var_name("kmc.staging"),
            "HELIO_SECRET_KMC_STAGING"
        );
    }

    #[tokio::test]
    async fn test_missing_secret_is_validation_error() {
        let store = EnvSecretStore::new();
        let result = store.access_secret("does-not-exist").await;
        assert!(matches!(result, Err(DomainError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_present_secret_resolves() {
        std::env::set_var("HELIO_SECRET_UNIT_TEST_ONLY", "tok123");

        let store = EnvSecretStore::new();
        let token = store.access_secret("unit-test-only").await.unwrap();
        assert_eq!(token, "tok123");

        std::env::remove_var("HELIO_SECRET_UNIT_TEST_ONLY");
    }
}

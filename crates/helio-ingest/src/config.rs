use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Run without NATS: in-memory document store, log-only publisher
    #[serde(default)]
    pub local_mode: bool,

    // NATS configuration
    /// NATS server URL
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// NATS JetStream stream name for telemetry subjects
    #[serde(default = "default_nats_stream")]
    pub nats_stream: String,

    /// Base subject telemetry messages are published under
    #[serde(default = "default_nats_subject")]
    pub nats_subject: String,

    /// KV bucket holding token cache entries and lock documents
    #[serde(default = "default_kv_bucket")]
    pub kv_bucket: String,

    /// Startup timeout for initialization operations in seconds
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    // Provider configuration
    /// AlsoEnergy API base URL
    #[serde(default = "default_also_energy_base_url")]
    pub also_energy_base_url: String,

    /// KMC Controls API base URL
    #[serde(default = "default_kmc_base_url")]
    pub kmc_base_url: String,

    /// Home-platform device API base URL (stale-device deprecation)
    #[serde(default = "default_device_api_base_url")]
    pub device_api_base_url: String,

    /// Retries after the first attempt for provider calls
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-request timeout for outbound provider calls in seconds
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    // Token cache configuration
    /// Whether provider tokens are cached at all
    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,

    /// Distributed lock TTL in seconds
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,

    /// Cached token TTL in seconds, shorter than the real token lifetime
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// NATS defaults
fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_nats_stream() -> String {
    "telemetry".to_string()
}

fn default_nats_subject() -> String {
    "telemetry".to_string()
}

fn default_kv_bucket() -> String {
    "helio-cache".to_string()
}

fn default_startup_timeout_secs() -> u64 {
    30
}

// Provider defaults
fn default_also_energy_base_url() -> String {
    "https://api.alsoenergy.com".to_string()
}

fn default_kmc_base_url() -> String {
    "https://api.kmccommander.com".to_string()
}

fn default_device_api_base_url() -> String {
    "http://localhost:8081".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_http_timeout_secs() -> u64 {
    30
}

// Token cache defaults
fn default_cache_enabled() -> bool {
    true
}

fn default_lock_ttl_secs() -> u64 {
    300
}

fn default_token_ttl_secs() -> u64 {
    3000
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("HELIO"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to ensure tests run serially and don't interfere with each other
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_config() {
        let _lock = TEST_LOCK.lock().unwrap();

        // Clear any existing HELIO_ environment variables
        std::env::remove_var("HELIO_BIND_ADDR");
        std::env::remove_var("HELIO_CACHE_ENABLED");
        std::env::remove_var("HELIO_TOKEN_TTL_SECS");

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.log_level, "info");
        assert!(!config.local_mode);
        assert!(config.cache_enabled);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.lock_ttl_secs, 300);
        assert_eq!(config.token_ttl_secs, 3000);
    }

    #[test]
    fn test_custom_config() {
        let _lock = TEST_LOCK.lock().unwrap();

        std::env::set_var("HELIO_BIND_ADDR", "127.0.0.1:9000");
        std::env::set_var("HELIO_CACHE_ENABLED", "false");
        std::env::set_var("HELIO_TOKEN_TTL_SECS", "600");

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert!(!config.cache_enabled);
        assert_eq!(config.token_ttl_secs, 600);

        // Clean up
        std::env::remove_var("HELIO_BIND_ADDR");
        std::env::remove_var("HELIO_CACHE_ENABLED");
        std::env::remove_var("HELIO_TOKEN_TTL_SECS");
    }
}

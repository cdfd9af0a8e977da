//! Configuration management for the VocalScale admin services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Hosted data store configuration
    pub store: StoreConfig,

    /// Knowledge processor configuration
    #[serde(default)]
    pub processor: ProcessorConfig,

    /// Result cache staleness windows
    #[serde(default)]
    pub cache: CacheConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Base URL of the hosted store (the REST API lives under /rest/v1)
    pub url: String,

    /// Service credential used for the administrative context
    pub service_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,

    /// Serve from the in-memory store instead of the hosted one
    #[serde(default)]
    pub in_memory: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessorConfig {
    /// Gateway URL in front of the knowledge processor (draft, execute, search)
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    /// Direct knowledge processor URL (health, metrics)
    #[serde(default = "default_processor_url")]
    pub processor_url: String,

    /// Timeout for health and metrics probes in milliseconds
    #[serde(default = "default_health_timeout")]
    pub health_timeout_ms: u64,

    /// Timeout for draft/action/search calls in seconds
    #[serde(default = "default_processor_timeout")]
    pub timeout_secs: u64,
}

/// Staleness windows per query family, in milliseconds
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_list_stale")]
    pub list_stale_ms: u64,

    #[serde(default = "default_stats_stale")]
    pub stats_stale_ms: u64,

    #[serde(default = "default_chart_stale")]
    pub chart_stale_ms: u64,

    #[serde(default = "default_catalog_stale")]
    pub catalog_stale_ms: u64,

    #[serde(default = "default_tickets_stale")]
    pub tickets_stale_ms: u64,

    #[serde(default = "default_messages_stale")]
    pub messages_stale_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Expose Prometheus metrics on /metrics
    #[serde(default = "default_enabled")]
    pub metrics_enabled: bool,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_store_timeout() -> u64 {
    15
}

fn default_gateway_url() -> String {
    "http://localhost:8080/api".to_string()
}

fn default_processor_url() -> String {
    "http://localhost:8001".to_string()
}

fn default_health_timeout() -> u64 {
    5000
}

fn default_processor_timeout() -> u64 {
    60
}

fn default_list_stale() -> u64 {
    15_000
}

fn default_stats_stale() -> u64 {
    30_000
}

fn default_chart_stale() -> u64 {
    60_000
}

fn default_catalog_stale() -> u64 {
    300_000
}

fn default_tickets_stale() -> u64 {
    30_000
}

fn default_messages_stale() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json_logging() -> bool {
    true
}

fn default_service_name() -> String {
    "vocalscale-admin".to_string()
}

fn default_rate_limit() -> u32 {
    50
}

fn default_burst() -> u32 {
    100
}

fn default_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            gateway_url: default_gateway_url(),
            processor_url: default_processor_url(),
            health_timeout_ms: default_health_timeout(),
            timeout_secs: default_processor_timeout(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            list_stale_ms: default_list_stale(),
            stats_stale_ms: default_stats_stale(),
            chart_stale_ms: default_chart_stale(),
            catalog_stale_ms: default_catalog_stale(),
            tickets_stale_ms: default_tickets_stale(),
            messages_stale_ms: default_messages_stale(),
        }
    }
}

impl CacheConfig {
    pub fn list(&self) -> Duration {
        Duration::from_millis(self.list_stale_ms)
    }

    pub fn stats(&self) -> Duration {
        Duration::from_millis(self.stats_stale_ms)
    }

    pub fn chart(&self) -> Duration {
        Duration::from_millis(self.chart_stale_ms)
    }

    pub fn catalog(&self) -> Duration {
        Duration::from_millis(self.catalog_stale_ms)
    }

    pub fn tickets(&self) -> Duration {
        Duration::from_millis(self.tickets_stale_ms)
    }

    pub fn messages(&self) -> Duration {
        Duration::from_millis(self.messages_stale_ms)
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_enabled: default_enabled(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("store.url", "http://localhost:54321")?
            // Base file, then the environment's file, then local overrides
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., APP__STORE__SERVICE_KEY=...
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Reject settings the gateway cannot start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("server.port must be greater than 0".to_string()));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "server.request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        // the demo store needs neither
        if self.store.in_memory {
            return Ok(());
        }
        if self.store.url.trim().is_empty() {
            return Err(ConfigError::Message("store.url must not be empty".to_string()));
        }
        if self
            .store
            .service_key
            .as_deref()
            .map_or(true, |key| key.trim().is_empty())
        {
            return Err(ConfigError::Message("store.service_key must be set".to_string()));
        }
        Ok(())
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreConfig {
                url: "http://localhost:54321".to_string(),
                service_key: None,
                timeout_secs: default_store_timeout(),
                in_memory: false,
            },
            processor: ProcessorConfig::default(),
            cache: CacheConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.processor.health_timeout_ms, 5000);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_validate() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_err(), "hosted store without a key");

        config.store.service_key = Some("service-role".to_string());
        assert!(config.validate().is_ok());

        config.store.url = "  ".to_string();
        assert!(config.validate().is_err());

        config.store.in_memory = true;
        assert!(config.validate().is_ok());

        config.server.port = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.port"));
    }

    #[test]
    fn test_staleness_presets() {
        let cache = CacheConfig::default();
        assert_eq!(cache.list(), Duration::from_secs(15));
        assert_eq!(cache.stats(), Duration::from_secs(30));
        assert_eq!(cache.chart(), Duration::from_secs(60));
        assert_eq!(cache.catalog(), Duration::from_secs(300));
    }
}

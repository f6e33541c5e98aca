//! API Configuration Module
//!
//! Server, CORS and refresh settings for the API binary. Configuration is
//! loaded from environment variables with defaults suitable for development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use vellum_core::RefreshConfig;

use crate::constants::{
    DEFAULT_BIND_HOST, DEFAULT_CORS_MAX_AGE_SECS, DEFAULT_FETCH_TIMEOUT_MS,
    DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_PORT, DEFAULT_WATCH_INTERVAL_MS,
};
use crate::error::{ApiError, ApiResult};

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// API configuration for the server, CORS and the schema cache.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    // ========================================================================
    // Server
    // ========================================================================
    pub bind_host: String,
    pub port: u16,

    /// Requests served concurrently before new ones queue.
    pub max_concurrent_requests: usize,

    // ========================================================================
    // CORS Configuration
    // ========================================================================
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    // ========================================================================
    // Schema cache
    // ========================================================================
    /// Bound on one coordination-store fetch.
    pub fetch_timeout: Duration,

    /// Whether the background watch polls for newer schema versions.
    pub watch_enabled: bool,

    pub watch_interval: Duration,

    /// Directory of `<collection>.json` schema files published at startup.
    pub schema_dir: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: DEFAULT_BIND_HOST.to_string(),
            port: DEFAULT_PORT,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            cors_origins: Vec::new(),
            cors_max_age_secs: DEFAULT_CORS_MAX_AGE_SECS,
            fetch_timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
            watch_enabled: false,
            watch_interval: Duration::from_millis(DEFAULT_WATCH_INTERVAL_MS),
            schema_dir: None,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `VELLUM_API_BIND`: Bind host (default: 0.0.0.0)
    /// - `PORT` / `VELLUM_API_PORT`: Listen port (default: 8983)
    /// - `VELLUM_MAX_CONCURRENT_REQUESTS`: Concurrency limit (default: 1024)
    /// - `VELLUM_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `VELLUM_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `VELLUM_FETCH_TIMEOUT_MS`: Coordination fetch timeout (default: 10000)
    /// - `VELLUM_WATCH_ENABLED`: "true" or "false" (default: false)
    /// - `VELLUM_WATCH_INTERVAL_MS`: Watch poll interval (default: 30000)
    /// - `VELLUM_SCHEMA_DIR`: Seed directory of schema files (default: none)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |name: &str| lookup(name).and_then(|s| s.trim().parse::<u64>().ok());

        let cors_origins = lookup("VELLUM_CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let port = lookup("PORT")
            .or_else(|| lookup("VELLUM_API_PORT"))
            .and_then(|s| s.trim().parse::<u16>().ok())
            .unwrap_or(defaults.port);

        let watch_enabled = lookup("VELLUM_WATCH_ENABLED")
            .map(|s| matches!(s.trim().to_lowercase().as_str(), "true" | "1"))
            .unwrap_or(defaults.watch_enabled);

        Self {
            bind_host: lookup("VELLUM_API_BIND").unwrap_or(defaults.bind_host),
            port,
            max_concurrent_requests: parsed("VELLUM_MAX_CONCURRENT_REQUESTS")
                .map(|n| n as usize)
                .unwrap_or(defaults.max_concurrent_requests),
            cors_origins,
            cors_max_age_secs: parsed("VELLUM_CORS_MAX_AGE_SECS")
                .unwrap_or(defaults.cors_max_age_secs),
            fetch_timeout: parsed("VELLUM_FETCH_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.fetch_timeout),
            watch_enabled,
            watch_interval: parsed("VELLUM_WATCH_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.watch_interval),
            schema_dir: lookup("VELLUM_SCHEMA_DIR")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    /// Refresh settings handed to the storage layer.
    pub fn to_refresh_config(&self) -> RefreshConfig {
        let config = RefreshConfig::default().with_fetch_timeout(self.fetch_timeout);
        if self.watch_enabled {
            config.with_watch(self.watch_interval)
        } else {
            config.without_watch()
        }
    }

    /// Socket address to listen on.
    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
    }

    /// Check if running in production mode (strict CORS).
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            // Wildcard subdomains: *.example.com
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(origin_domain) = origin.strip_prefix("https://") {
                    return origin_domain.ends_with(&format!(".{}", pattern));
                }
            }
            false
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> ApiConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert!(config.cors_origins.is_empty());
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.fetch_timeout, Duration::from_secs(10));
        assert!(!config.watch_enabled);
        assert!(config.schema_dir.is_none());
    }

    #[test]
    fn test_from_lookup_reads_variables() {
        let config = config_from(&[
            ("VELLUM_API_PORT", "9000"),
            ("VELLUM_FETCH_TIMEOUT_MS", "250"),
            ("VELLUM_WATCH_ENABLED", "TRUE"),
            ("VELLUM_WATCH_INTERVAL_MS", "1500"),
            ("VELLUM_SCHEMA_DIR", "/etc/vellum/schemas"),
            ("VELLUM_CORS_ORIGINS", "https://a.example, ,https://b.example"),
        ]);

        assert_eq!(config.port, 9000);
        assert_eq!(config.fetch_timeout, Duration::from_millis(250));
        assert!(config.watch_enabled);
        assert_eq!(config.watch_interval, Duration::from_millis(1500));
        assert_eq!(config.schema_dir, Some(PathBuf::from("/etc/vellum/schemas")));
        assert_eq!(config.cors_origins.len(), 2);
    }

    #[test]
    fn test_port_prefers_platform_variable() {
        let config = config_from(&[("PORT", "7000"), ("VELLUM_API_PORT", "9000")]);
        assert_eq!(config.port, 7000);
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let config = config_from(&[
            ("VELLUM_API_PORT", "not-a-port"),
            ("VELLUM_FETCH_TIMEOUT_MS", "-5"),
        ]);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.fetch_timeout, Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS));
    }

    #[test]
    fn test_to_refresh_config() {
        let config = config_from(&[("VELLUM_FETCH_TIMEOUT_MS", "0")]);
        assert!(config.to_refresh_config().validate().is_err());

        let config = config_from(&[("VELLUM_WATCH_ENABLED", "true")]);
        let refresh = config.to_refresh_config();
        assert!(refresh.watch_enabled);
        assert_eq!(refresh.watch_interval, Duration::from_millis(DEFAULT_WATCH_INTERVAL_MS));
        assert!(refresh.validate().is_ok());
    }

    #[test]
    fn test_bind_addr() {
        let config = ApiConfig::default();
        assert_eq!(config.bind_addr().map(|a| a.port()).ok(), Some(DEFAULT_PORT));

        let config = config_from(&[("VELLUM_API_BIND", "not a host")]);
        assert!(config.bind_addr().is_err());
    }

    #[test]
    fn test_origin_allowed() {
        let config = ApiConfig::default();
        assert!(!config.is_production());
        assert!(config.is_origin_allowed("http://localhost:3000"));

        let config = config_from(&[("VELLUM_CORS_ORIGINS", "https://admin.example,*.search.example")]);
        assert!(config.is_production());
        assert!(config.is_origin_allowed("https://admin.example"));
        assert!(config.is_origin_allowed("https://eu.search.example"));
        assert!(!config.is_origin_allowed("https://evilsearch.example"));
        assert!(!config.is_origin_allowed("https://evil.example"));
    }
}

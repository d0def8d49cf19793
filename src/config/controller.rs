//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use crate::crd::ApiVersion;
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have defaults and can be overridden via environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// `DatadogAgent` version to watch (`WATCH_API_VERSION`)
    pub watch_api_version: ApiVersion,
    /// Port of the metrics and probe server
    pub metrics_port: u16,
    /// Requeue interval after a successful pass (seconds)
    pub resync_interval_secs: u64,
    /// Fibonacci backoff minimum after a transient failure (seconds)
    pub backoff_min_secs: u64,
    /// Fibonacci backoff maximum (seconds)
    pub backoff_max_secs: u64,
    /// Maximum concurrent reconciliations
    pub max_concurrent_reconciliations: u16,
    /// API key from the controller's own environment (`DD_API_KEY`)
    pub api_key_fallback: Option<String>,
    /// Application key from the controller's own environment (`DD_APP_KEY`)
    pub app_key_fallback: Option<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            watch_api_version: ApiVersion::V2Alpha1,
            metrics_port: DEFAULT_METRICS_PORT,
            resync_interval_secs: DEFAULT_RESYNC_INTERVAL_SECS,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            max_concurrent_reconciliations: 10,
            api_key_fallback: None,
            app_key_fallback: None,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        use crate::constants::*;
        let watch_api_version =
            env_var_or_default_str("WATCH_API_VERSION", DEFAULT_WATCH_API_VERSION);
        Self {
            watch_api_version: ApiVersion::parse(&watch_api_version)
                .unwrap_or(ApiVersion::V2Alpha1),
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            resync_interval_secs: env_var_or_default(
                "RESYNC_INTERVAL_SECS",
                DEFAULT_RESYNC_INTERVAL_SECS,
            ),
            backoff_min_secs: env_var_or_default("BACKOFF_MIN_SECS", DEFAULT_BACKOFF_MIN_SECS),
            backoff_max_secs: env_var_or_default("BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS),
            max_concurrent_reconciliations: env_var_or_default(
                "MAX_CONCURRENT_RECONCILIATIONS",
                10,
            ),
            api_key_fallback: env_var_non_empty(DD_API_KEY),
            app_key_fallback: env_var_non_empty(DD_APP_KEY),
        }
    }

    /// Get resync interval duration
    #[must_use]
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_var_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

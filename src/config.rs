//! Configuration for truthguard.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Gateway configuration.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Polling session configuration.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Per-request retry configuration.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Gateway endpoints and tagging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway base URLs in priority order.
    ///
    /// GraphQL queries go to `{endpoint}/graphql`, payloads are read from
    /// `{endpoint}/{tx_id}` and uploads are posted to `{endpoint}/tx`.
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    /// Value of the `App-Name` tag written on claims and expected on results.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Optional per-request timeout in seconds. Unset means no timeout.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Number of decoded result records kept in memory.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

/// Longest accepted polling interval, one day.
pub const MAX_POLL_INTERVAL_SECS: u64 = 86_400;

/// Polling session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Seconds between poll ticks.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Ticks before a session times out.
    #[serde(default = "default_poll_attempts")]
    pub max_attempts: u32,
}

/// Retry configuration for a single HTTP request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per request, including the first.
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: u32,

    /// Base back-off delay in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            polling: PollingConfig::default(),
            retry: RetryConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            app_name: default_app_name(),
            request_timeout_secs: None,
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_attempts: default_poll_attempts(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl PollingConfig {
    /// Interval between ticks.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl RetryConfig {
    /// Base back-off delay.
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

fn default_endpoints() -> Vec<String> {
    vec![
        "https://arweave.net".to_string(),
        "https://ar-io.net".to_string(),
        "https://g8way.io".to_string(),
    ]
}

fn default_app_name() -> String {
    "TruthGuard".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_cache_capacity() -> usize {
    1024
}

const fn default_interval_secs() -> u64 {
    5
}

const fn default_poll_attempts() -> u32 {
    12
}

const fn default_retry_attempts() -> u32 {
    3
}

const fn default_base_delay_ms() -> u64 {
    1000
}

impl ClientConfig {
    /// Default location of the configuration file.
    #[must_use]
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("", "", "truthguard")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(".truthguard/config.toml"))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &Path) -> crate::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check the configuration for values the client cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] describing the first problem found.
    pub fn validate(&self) -> crate::Result<()> {
        if self.gateway.endpoints.is_empty() {
            return Err(crate::Error::Config(
                "at least one gateway endpoint is required".into(),
            ));
        }
        for endpoint in &self.gateway.endpoints {
            let url = reqwest::Url::parse(endpoint).map_err(|e| {
                crate::Error::Config(format!("invalid gateway endpoint {endpoint:?}: {e}"))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(crate::Error::Config(format!(
                    "gateway endpoint {endpoint:?} must use http or https"
                )));
            }
        }
        if self.gateway.app_name.trim().is_empty() {
            return Err(crate::Error::Config("app_name must not be empty".into()));
        }
        if self.polling.interval_secs == 0 {
            return Err(crate::Error::Config(
                "polling.interval_secs must be greater than zero".into(),
            ));
        }
        if self.polling.interval_secs > MAX_POLL_INTERVAL_SECS {
            return Err(crate::Error::Config(format!(
                "polling.interval_secs must be at most {MAX_POLL_INTERVAL_SECS}"
            )));
        }
        if self.polling.max_attempts == 0 {
            return Err(crate::Error::Config(
                "polling.max_attempts must be greater than zero".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(crate::Error::Config(
                "retry.max_attempts must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

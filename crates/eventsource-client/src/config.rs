//! EventSource configuration with YAML support

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use url::Url;

use eventsource_core::DEFAULT_MAX_EVENT_SIZE;

/// Reconnection delay used until the server sends a `retry:` field
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(3000);

/// EventSource configuration
///
/// Can be loaded from YAML, JSON, or constructed programmatically.
///
/// ```yaml
/// url: "http://localhost:8080/events"
/// headers:
///   Authorization: "Bearer secret"
/// retry_ms: 3000
/// max_event_size: 1048576
/// timeouts:
///   connect_ms: 10000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSourceConfig {
    /// Stream URL
    pub url: String,

    /// Extra request headers sent on every connection attempt
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Initial reconnection delay in milliseconds (default: 3000)
    #[serde(default = "default_retry_ms")]
    pub retry_ms: u64,

    /// Upper bound for one buffered event in bytes (default: 1 MiB)
    #[serde(default = "default_max_event_size")]
    pub max_event_size: usize,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
}

/// Timeout configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// Connect timeout in milliseconds (default: 10s)
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_timeout(),
        }
    }
}

fn default_retry_ms() -> u64 {
    DEFAULT_RETRY_INTERVAL.as_millis() as u64
}

fn default_max_event_size() -> usize {
    DEFAULT_MAX_EVENT_SIZE
}

fn default_connect_timeout() -> u64 {
    10_000 // 10 seconds
}

impl EventSourceConfig {
    /// Configuration with defaults for the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self::builder(url).build()
    }

    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Serialize configuration to YAML
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }

    /// Create a builder for programmatic configuration
    pub fn builder(url: impl Into<String>) -> EventSourceConfigBuilder {
        EventSourceConfigBuilder::new(url)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.connect_ms)
    }

    /// Parsed stream URL
    pub fn parsed_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.url).map_err(|e| ConfigError::Invalid(format!("url {}: {}", self.url, e)))
    }

    /// Extra headers as a header map
    pub fn header_map(&self) -> Result<HeaderMap, ConfigError> {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ConfigError::Invalid(format!("header name {:?}: {}", name, e)))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| ConfigError::Invalid(format!("header {}: {}", name, e)))?;
            map.insert(header_name, header_value);
        }
        Ok(map)
    }

    /// Check that the configuration can be used to open a stream
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parsed_url()?;
        self.header_map()?;
        if self.max_event_size == 0 {
            return Err(ConfigError::Invalid(
                "max_event_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for EventSourceConfig
pub struct EventSourceConfigBuilder {
    config: EventSourceConfig,
}

impl EventSourceConfigBuilder {
    /// Create a new builder with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            config: EventSourceConfig {
                url: url.into(),
                headers: BTreeMap::new(),
                retry_ms: default_retry_ms(),
                max_event_size: default_max_event_size(),
                timeouts: TimeoutsConfig::default(),
            },
        }
    }

    /// Add a request header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.headers.insert(name.into(), value.into());
        self
    }

    /// Set the initial reconnection delay
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.config.retry_ms = interval.as_millis() as u64;
        self
    }

    /// Set the maximum buffered event size in bytes
    pub fn max_event_size(mut self, bytes: usize) -> Self {
        self.config.max_event_size = bytes;
        self
    }

    /// Set connect timeout in milliseconds
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.connect_ms = ms;
        self
    }

    /// Build the configuration
    pub fn build(self) -> EventSourceConfig {
        self.config
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for crate::error::EventSourceError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

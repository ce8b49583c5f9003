//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from a TOML file.
//! Every field has a default so an empty file (or no file) is valid.

use serde::{Deserialize, Serialize};

/// Root configuration for the request-file engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Outgoing HTTP client settings.
    pub http: HttpConfig,

    /// Where upload and temp files are written.
    pub storage: StorageConfig,

    /// Watch-mode settings.
    pub watch: WatchConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// HTTP client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Connection establishment timeout in seconds. `None` keeps the
    /// transport default.
    pub connect_timeout_secs: Option<u64>,

    /// User-Agent sent when a request does not set one.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: None,
            user_agent: concat!("reqfile/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Side-effect file locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for `upload_<field>_<filename>` files.
    pub upload_dir: String,

    /// Directory for buffered stream bodies.
    pub temp_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: ".".to_string(),
            temp_dir: ".".to_string(),
        }
    }
}

/// Watch-mode configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Poll interval for the file watcher in milliseconds.
    pub poll_interval_ms: u64,

    /// Quiet period after the last change before the file is read.
    pub debounce_ms: u64,

    /// Content containing this marker is still being edited and is skipped.
    pub wait_marker: String,

    /// Content shorter than this is skipped.
    pub min_content_len: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            debounce_ms: 100,
            wait_marker: "____WAIT____".to_string(),
            min_content_len: 2,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

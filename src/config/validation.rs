//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, parsable addresses)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EngineConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::EngineConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unknown log level '{0}'")]
    LogLevel(String),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),
}

/// Check an already-deserialized configuration.
pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::LogLevel(config.observability.log_level.clone()));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.http.connect_timeout_secs == Some(0) {
        errors.push(ValidationError::Zero { field: "http.connect_timeout_secs" });
    }
    if config.watch.poll_interval_ms == 0 {
        errors.push(ValidationError::Zero { field: "watch.poll_interval_ms" });
    }
    if config.watch.debounce_ms == 0 {
        errors.push(ValidationError::Zero { field: "watch.debounce_ms" });
    }
    if config.watch.wait_marker.is_empty() {
        errors.push(ValidationError::Empty { field: "watch.wait_marker" });
    }
    if config.storage.upload_dir.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "storage.upload_dir" });
    }
    if config.storage.temp_dir.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "storage.temp_dir" });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

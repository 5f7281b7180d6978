//! Configuration errors.

use thiserror::Error;

/// Result type alias for configuration validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that make a controller configuration unusable.
///
/// These are fatal at startup: the daemon refuses to enter its loop.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("high threshold {high} must be strictly below low threshold {low}")]
    ThresholdOrder { high: f64, low: f64 },

    #[error("{name} threshold {value} must be a finite fraction in [0, 1]")]
    ThresholdRange { name: &'static str, value: f64 },

    #[error("{0} must be greater than zero")]
    NonPositiveDuration(&'static str),

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("invalid duration: {0:?}")]
    InvalidDuration(String),

    #[error("invalid latency bound {0}: must be a positive, finite number of seconds")]
    InvalidLatencyBound(f64),

    #[error("invalid endpoint {url:?}: {reason}")]
    InvalidEndpoint { url: String, reason: String },
}

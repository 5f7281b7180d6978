//! Metrics query errors.

use thiserror::Error;

use latscale_http::HttpError;

/// Result type alias for metrics queries.
pub type MetricsResult<T> = Result<T, MetricsError>;

/// Why a latency query produced no usable value.
///
/// These never escape [`MetricsClient::sample`](crate::MetricsClient::sample);
/// they are logged and mapped to `Unavailable`.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("invalid metrics endpoint {0:?}")]
    Endpoint(String),

    #[error("transport: {0}")]
    Transport(#[from] HttpError),

    #[error("prometheus returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("query failed ({error_type}): {message}")]
    QueryFailed { error_type: String, message: String },

    #[error("unexpected result type {0:?}")]
    ResultType(String),

    #[error("empty result set")]
    EmptyResult,

    #[error("value {0:?} is not a number")]
    InvalidValue(String),

    #[error("value {0} is not a fraction in [0, 1]")]
    OutOfRange(f64),
}

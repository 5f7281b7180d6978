//! Orchestration errors.

use thiserror::Error;

use latscale_http::HttpError;

/// Result type alias for orchestration calls.
pub type OrchestrationResult<T> = Result<T, OrchestrationError>;

/// Failures talking to the orchestration API.
///
/// All of these are transient from the control loop's point of view except
/// `Credentials`, which only occurs while building a client at startup.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("invalid replica count {0}: must be at least 1")]
    InvalidReplicas(i64),

    #[error("credentials: {0}")]
    Credentials(String),

    #[error("transport: {0}")]
    Transport(#[from] HttpError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("api returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

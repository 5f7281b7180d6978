//! Transport errors.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for HTTP transport operations.
pub type HttpResult<T> = Result<T, HttpError>;

/// Errors raised before a response status is available.
///
/// A non-2xx status is not an error at this layer; callers inspect
/// [`HttpResponse::status`](crate::HttpResponse) themselves.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid uri {uri:?}: {reason}")]
    InvalidUri { uri: String, reason: &'static str },

    #[error("https requested for {0} but no tls configuration is set")]
    TlsNotConfigured(String),

    #[error("invalid tls configuration: {0}")]
    TlsConfig(String),

    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("tls handshake with {host} failed: {source}")]
    Tls {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("http handshake failed: {0}")]
    Handshake(#[source] hyper::Error),

    #[error("request failed: {0}")]
    Request(#[source] hyper::Error),

    /// Includes bodies over the client's size limit.
    #[error("reading response body failed: {0}")]
    Body(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("request to {uri} timed out after {timeout:?}")]
    Timeout { uri: String, timeout: Duration },

    #[error("building request: {0}")]
    Build(#[from] http::Error),
}

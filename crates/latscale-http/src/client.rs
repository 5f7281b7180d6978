//! HTTP/1.1 client.
//!
//! Opens a fresh connection per request. Controller traffic is a handful
//! of requests every few seconds, so there is no pool.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{HOST, USER_AGENT};
use http::{HeaderValue, Request, StatusCode, Uri};
use http_body_util::{BodyExt, Full, Limited};
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::error::{HttpError, HttpResult};

/// Largest response body read into memory by default.
pub const DEFAULT_BODY_LIMIT: usize = 8 * 1024 * 1024;

/// A fully-read HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body as lossy UTF-8, for log messages.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Outbound HTTP client with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpClient {
    tls: Option<Arc<rustls::ClientConfig>>,
    timeout: Duration,
    body_limit: usize,
    user_agent: HeaderValue,
}

impl HttpClient {
    /// Plain-HTTP client. Call [`with_tls`](Self::with_tls) to allow `https`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            tls: None,
            timeout,
            body_limit: DEFAULT_BODY_LIMIT,
            user_agent: HeaderValue::from_static(concat!("latscale/", env!("CARGO_PKG_VERSION"))),
        }
    }

    pub fn with_tls(mut self, config: Arc<rustls::ClientConfig>) -> Self {
        self.tls = Some(config);
        self
    }

    /// Cap on the bytes read from a response body.
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send a request and read the whole response body.
    ///
    /// The timeout covers connect, TLS, request, and body. Bodies larger
    /// than the body limit fail with [`HttpError::Body`].
    pub async fn send(&self, request: Request<Full<Bytes>>) -> HttpResult<HttpResponse> {
        let uri = request.uri().to_string();
        match tokio::time::timeout(self.timeout, self.exchange(request)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(%uri, timeout_ms = self.timeout.as_millis() as u64, "http request timed out");
                Err(HttpError::Timeout {
                    uri,
                    timeout: self.timeout,
                })
            }
        }
    }

    async fn exchange(&self, mut request: Request<Full<Bytes>>) -> HttpResult<HttpResponse> {
        let uri = request.uri().clone();
        let invalid = |reason| HttpError::InvalidUri {
            uri: uri.to_string(),
            reason,
        };

        let https = match uri.scheme_str() {
            Some("https") => true,
            Some("http") => false,
            _ => return Err(invalid("scheme must be http or https")),
        };
        let host = uri
            .host()
            .ok_or_else(|| invalid("missing host"))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = uri.port_u16().unwrap_or(if https { 443 } else { 80 });
        let authority = uri
            .authority()
            .map(|a| a.as_str().to_string())
            .unwrap_or_else(|| host.clone());

        let tls = if https {
            Some(
                self.tls
                    .clone()
                    .ok_or_else(|| HttpError::TlsNotConfigured(uri.to_string()))?,
            )
        } else {
            None
        };

        // Send the request target in origin-form.
        let target = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
        *request.uri_mut() = target
            .parse::<Uri>()
            .map_err(|_| invalid("bad path and query"))?;
        let host_header =
            HeaderValue::from_str(&authority).map_err(|_| invalid("bad authority"))?;
        let headers = request.headers_mut();
        headers.insert(HOST, host_header);
        headers
            .entry(USER_AGENT)
            .or_insert_with(|| self.user_agent.clone());

        let addr = format!("{host}:{port}");
        let stream = TcpStream::connect((host.as_str(), port))
            .await
            .map_err(|source| HttpError::Connect {
                addr: addr.clone(),
                source,
            })?;

        match tls {
            Some(config) => {
                let server_name = ServerName::try_from(host.clone())
                    .map_err(|_| invalid("host is not a valid tls server name"))?;
                let stream = TlsConnector::from(config)
                    .connect(server_name, stream)
                    .await
                    .map_err(|source| HttpError::Tls { host, source })?;
                roundtrip(TokioIo::new(stream), request, self.body_limit).await
            }
            None => roundtrip(TokioIo::new(stream), request, self.body_limit).await,
        }
    }
}

async fn roundtrip<I>(
    io: I,
    request: Request<Full<Bytes>>,
    body_limit: usize,
) -> HttpResult<HttpResponse>
where
    I: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(HttpError::Handshake)?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "http connection closed with error");
        }
    });

    let response = sender
        .send_request(request)
        .await
        .map_err(HttpError::Request)?;
    let status = response.status();
    let body = Limited::new(response.into_body(), body_limit)
        .collect()
        .await
        .map_err(HttpError::Body)?
        .to_bytes();

    Ok(HttpResponse { status, body })
}

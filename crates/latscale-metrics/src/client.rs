//! Metrics clients.

use std::future::Future;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderValue, Method, Request, Uri};
use http_body_util::Full;
use tracing::{debug, warn};

use latscale_core::{LatencySample, MetricsConfig, WorkloadRef};
use latscale_http::{HttpClient, HttpError, webpki_roots_config};

use crate::error::{MetricsError, MetricsResult};
use crate::query::LatencyQuery;
use crate::response::parse_value;

/// Error bodies are cut to this many bytes in log messages.
const MAX_ERROR_BODY: usize = 256;

/// Source of latency samples for a workload.
///
/// `sample` never fails: anything that prevents a trustworthy fraction is
/// reported as [`LatencySample::Unavailable`].
pub trait MetricsClient: Send + Sync {
    fn sample(&self, workload: &WorkloadRef) -> impl Future<Output = LatencySample> + Send;
}

/// Prometheus-backed [`MetricsClient`].
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    http: HttpClient,
    query_uri: String,
    authorization: Option<HeaderValue>,
    query: LatencyQuery,
}

impl PrometheusClient {
    /// Build a client from config. `https` endpoints trust the Mozilla roots.
    pub fn new(config: &MetricsConfig) -> MetricsResult<Self> {
        let query_uri = format!("{}/api/v1/query", config.endpoint.trim_end_matches('/'));
        let uri: Uri = query_uri
            .parse()
            .map_err(|_| MetricsError::Endpoint(config.endpoint.clone()))?;

        let mut http = HttpClient::new(config.timeout);
        if uri.scheme_str() == Some("https") {
            http = http.with_tls(webpki_roots_config()?);
        }

        let authorization = if config.has_credentials() {
            let token = STANDARD.encode(format!("{}:{}", config.username, config.password));
            let mut value = HeaderValue::from_str(&format!("Basic {token}"))
                .map_err(|_| MetricsError::Endpoint(config.endpoint.clone()))?;
            value.set_sensitive(true);
            Some(value)
        } else {
            None
        };

        Ok(Self {
            http,
            query_uri,
            authorization,
            query: LatencyQuery::from_config(config),
        })
    }

    pub fn query(&self) -> &LatencyQuery {
        &self.query
    }

    /// Run the latency query and return the raw fraction.
    pub async fn query_ratio(&self, workload: &WorkloadRef) -> MetricsResult<f64> {
        let promql = self.query.render(workload);
        debug!(%workload, query = %promql, "querying latency ratio");

        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(&self.query_uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(ACCEPT, "application/json");
        if let Some(auth) = &self.authorization {
            builder = builder.header(AUTHORIZATION, auth.clone());
        }
        let body = format!("query={}", urlencoding::encode(&promql));
        let request = builder
            .body(Full::new(Bytes::from(body)))
            .map_err(HttpError::from)?;

        let response = self.http.send(request).await?;
        if !response.is_success() {
            let mut body = response.body_text();
            truncate_utf8(&mut body, MAX_ERROR_BODY);
            return Err(MetricsError::Status {
                status: response.status.as_u16(),
                body,
            });
        }

        let value = parse_value(&response.body)?;
        if !(value.is_finite() && (0.0..=1.0).contains(&value)) {
            return Err(MetricsError::OutOfRange(value));
        }
        Ok(value)
    }
}

impl MetricsClient for PrometheusClient {
    async fn sample(&self, workload: &WorkloadRef) -> LatencySample {
        match self.query_ratio(workload).await {
            Ok(ratio) => {
                debug!(%workload, ratio, "latency sample");
                LatencySample::from_ratio(ratio)
            }
            Err(e) => {
                warn!(%workload, error = %e, "latency sample unavailable");
                LatencySample::Unavailable
            }
        }
    }
}

fn truncate_utf8(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use latscale_http::testing::{CannedResponse, spawn_canned};

    fn config_for(addr: std::net::SocketAddr) -> MetricsConfig {
        MetricsConfig {
            endpoint: format!("http://{addr}/prometheus/"),
            timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    fn vector(value: &str) -> String {
        format!(
            r#"{{"status":"success","data":{{"resultType":"vector","result":[{{"metric":{{}},"value":[1700000000,"{value}"]}}]}}}}"#
        )
    }

    fn api() -> WorkloadRef {
        WorkloadRef::new("pycont", "api")
    }

    #[tokio::test]
    async fn sample_posts_encoded_query() {
        let (addr, server) = spawn_canned(vec![CannedResponse::json(200, vector("0.97"))]).await;
        let client = PrometheusClient::new(&config_for(addr)).unwrap();

        let sample = client.sample(&api()).await;
        assert_eq!(sample, LatencySample::Ratio(0.97));

        let requests = server.await.unwrap();
        let req = &requests[0];
        assert_eq!(req.method, "POST");
        assert_eq!(req.target, "/prometheus/api/v1/query");
        assert_eq!(req.header("content-type"), Some("application/x-www-form-urlencoded"));
        assert_eq!(req.header("authorization"), None);

        let expected = format!("query={}", urlencoding::encode(&client.query().render(&api())));
        assert_eq!(req.body, expected);
    }

    #[tokio::test]
    async fn basic_auth_is_sent_when_configured() {
        let (addr, server) = spawn_canned(vec![CannedResponse::json(200, vector("0.5"))]).await;
        let config = MetricsConfig {
            username: "prom".to_string(),
            password: "secret".to_string(),
            ..config_for(addr)
        };
        let client = PrometheusClient::new(&config).unwrap();
        client.sample(&api()).await;

        let requests = server.await.unwrap();
        // base64("prom:secret")
        assert_eq!(requests[0].header("authorization"), Some("Basic cHJvbTpzZWNyZXQ="));
    }

    #[tokio::test]
    async fn zero_ratio_is_available() {
        let (addr, _server) = spawn_canned(vec![CannedResponse::json(200, vector("0"))]).await;
        let client = PrometheusClient::new(&config_for(addr)).unwrap();
        assert_eq!(client.sample(&api()).await, LatencySample::Ratio(0.0));
    }

    #[tokio::test]
    async fn nan_ratio_is_unavailable() {
        let (addr, _server) = spawn_canned(vec![CannedResponse::json(200, vector("NaN"))]).await;
        let client = PrometheusClient::new(&config_for(addr)).unwrap();

        let err = client.query_ratio(&api()).await.unwrap_err();
        assert!(matches!(err, MetricsError::OutOfRange(v) if v.is_nan()));
    }

    #[tokio::test]
    async fn empty_result_is_unavailable() {
        let body = r#"{"status":"success","data":{"resultType":"vector","result":[]}}"#;
        let (addr, _server) = spawn_canned(vec![CannedResponse::json(200, body)]).await;
        let client = PrometheusClient::new(&config_for(addr)).unwrap();
        assert_eq!(client.sample(&api()).await, LatencySample::Unavailable);
    }

    #[tokio::test]
    async fn server_error_is_unavailable() {
        let body = r#"{"status":"error","errorType":"timeout","error":"query timed out"}"#;
        let (addr, _server) = spawn_canned(vec![CannedResponse::json(503, body)]).await;
        let client = PrometheusClient::new(&config_for(addr)).unwrap();

        let err = client.query_ratio(&api()).await.unwrap_err();
        assert!(matches!(err, MetricsError::Status { status: 503, .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn unreachable_server_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = PrometheusClient::new(&config_for(addr)).unwrap();
        assert_eq!(client.sample(&api()).await, LatencySample::Unavailable);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let mut s = "héllo".to_string();
        truncate_utf8(&mut s, 2);
        assert_eq!(s, "h");
    }
}

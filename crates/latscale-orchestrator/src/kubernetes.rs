//! Kubernetes `apps/v1` Deployment client.

use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderValue, Method, Request, StatusCode};
use http_body_util::Full;
use tracing::{debug, info};

use latscale_core::{OrchestratorConfig, Workload, WorkloadRef};
use latscale_http::{HttpClient, HttpError, ca_pem_config, webpki_roots_config};

use crate::client::{OrchestrationClient, ensure_positive};
use crate::credentials::{ApiAccess, BearerToken};
use crate::error::{OrchestrationError, OrchestrationResult};
use crate::resources::{
    DeploymentList, Scale, Status, into_workloads, label_timestamp, replicas_of, scale_patch,
};

const MERGE_PATCH: &str = "application/merge-patch+json";

/// Talks to the Kubernetes API server over plain HTTP(S).
#[derive(Debug, Clone)]
pub struct KubernetesClient {
    http: HttpClient,
    base_url: String,
    token: Option<BearerToken>,
}

impl KubernetesClient {
    pub fn new(access: ApiAccess, timeout: Duration) -> OrchestrationResult<Self> {
        let mut http = HttpClient::new(timeout);
        if access.is_https() {
            let tls = match &access.ca_pem {
                Some(pem) => ca_pem_config(pem)?,
                None => webpki_roots_config()?,
            };
            http = http.with_tls(tls);
        }

        if let Some(BearerToken::Static(token)) = &access.token {
            bearer_header(token)?;
        }

        Ok(Self {
            http,
            base_url: access.base_url,
            token: access.token,
        })
    }

    /// Resolve credentials from config and build a client.
    pub fn from_config(config: &OrchestratorConfig) -> OrchestrationResult<Self> {
        let access = ApiAccess::from_config(config)?;
        info!(api_server = %access.base_url, "orchestration client configured");
        Self::new(access, config.timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn deployments_url(&self, namespace: &str) -> String {
        format!("{}/apis/apps/v1/namespaces/{namespace}/deployments", self.base_url)
    }

    fn deployment_url(&self, workload: &WorkloadRef) -> String {
        format!("{}/{}", self.deployments_url(&workload.namespace), workload.name)
    }

    /// Send one request and return the body of a 2xx response.
    async fn call(
        &self,
        method: Method,
        url: &str,
        subject: &str,
        body: Option<(&'static str, Bytes)>,
    ) -> OrchestrationResult<Bytes> {
        let mut builder = Request::builder()
            .method(method)
            .uri(url)
            .header(ACCEPT, "application/json");
        if let Some(token) = &self.token {
            builder = builder.header(AUTHORIZATION, bearer_header(&token.current().await?)?);
        }
        let payload = match body {
            Some((content_type, bytes)) => {
                builder = builder.header(CONTENT_TYPE, content_type);
                bytes
            }
            None => Bytes::new(),
        };
        let request = builder.body(Full::new(payload)).map_err(HttpError::from)?;

        let response = self.http.send(request).await?;
        if response.is_success() {
            return Ok(response.body);
        }
        Err(status_error(response.status, &response.body, subject))
    }
}

fn bearer_header(token: &str) -> OrchestrationResult<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
        OrchestrationError::Credentials("token contains invalid header characters".to_string())
    })?;
    value.set_sensitive(true);
    Ok(value)
}

fn status_error(status: StatusCode, body: &[u8], subject: &str) -> OrchestrationError {
    let api_status: Status = serde_json::from_slice(body).unwrap_or_default();
    let message = if api_status.message.is_empty() {
        String::from_utf8_lossy(body).chars().take(256).collect()
    } else {
        api_status.message
    };

    match status {
        StatusCode::NOT_FOUND => OrchestrationError::NotFound(subject.to_string()),
        StatusCode::CONFLICT => OrchestrationError::Conflict(format!("{subject}: {message}")),
        _ => OrchestrationError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

impl OrchestrationClient for KubernetesClient {
    async fn list_workloads(&self, namespace: &str) -> OrchestrationResult<Vec<Workload>> {
        let url = self.deployments_url(namespace);
        let body = self
            .call(Method::GET, &url, &format!("namespace {namespace}"), None)
            .await?;
        let list: DeploymentList = serde_json::from_slice(&body)?;
        let workloads = into_workloads(list, namespace);
        debug!(%namespace, count = workloads.len(), "listed workloads");
        Ok(workloads)
    }

    async fn read_replicas(&self, workload: &WorkloadRef) -> OrchestrationResult<u32> {
        let url = format!("{}/scale", self.deployment_url(workload));
        let body = self
            .call(Method::GET, &url, &workload.key(), None)
            .await?;
        let scale: Scale = serde_json::from_slice(&body)?;
        replicas_of(scale.spec.as_ref()).map_err(|raw| OrchestrationError::Api {
            status: StatusCode::OK.as_u16(),
            message: format!("{workload} reports negative replicas {raw}"),
        })
    }

    async fn patch_replicas(&self, workload: &WorkloadRef, replicas: u32) -> OrchestrationResult<()> {
        let replicas = ensure_positive(replicas)?;
        let stamp = label_timestamp(Utc::now());
        let patch = serde_json::to_vec(&scale_patch(replicas, &stamp))?;

        self.call(
            Method::PATCH,
            &self.deployment_url(workload),
            &workload.key(),
            Some((MERGE_PATCH, Bytes::from(patch))),
        )
        .await?;

        info!(%workload, replicas, last_scaling = %stamp, "patched replicas");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use super::*;
    use latscale_http::testing::{CannedResponse, spawn_canned};

    fn client_for(addr: SocketAddr, token: Option<&str>) -> KubernetesClient {
        KubernetesClient::new(
            ApiAccess {
                base_url: format!("http://{addr}"),
                token: token.map(|t| BearerToken::Static(t.to_string())),
                ca_pem: None,
            },
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn api() -> WorkloadRef {
        WorkloadRef::new("pycont", "api")
    }

    #[tokio::test]
    async fn list_workloads_reads_deployments() {
        let body = r#"{"kind":"DeploymentList","items":[
            {"metadata":{"name":"api","namespace":"pycont"},"spec":{"replicas":3}},
            {"metadata":{"name":"latscale-operator","namespace":"pycont"},"spec":{"replicas":1}}
        ]}"#;
        let (addr, server) = spawn_canned(vec![CannedResponse::json(200, body)]).await;
        let client = client_for(addr, Some("t0ken"));

        let workloads = client.list_workloads("pycont").await.unwrap();
        assert_eq!(workloads.len(), 2);
        assert_eq!(workloads[0], Workload::new(api(), 3));

        let requests = server.await.unwrap();
        assert_eq!(requests[0].method, "GET");
        assert_eq!(requests[0].target, "/apis/apps/v1/namespaces/pycont/deployments");
        assert_eq!(requests[0].header("authorization"), Some("Bearer t0ken"));
    }

    #[tokio::test]
    async fn read_replicas_uses_scale_subresource() {
        let body = r#"{"kind":"Scale","spec":{"replicas":4},"status":{"replicas":4}}"#;
        let (addr, server) = spawn_canned(vec![CannedResponse::json(200, body)]).await;
        let client = client_for(addr, None);

        assert_eq!(client.read_replicas(&api()).await.unwrap(), 4);

        let requests = server.await.unwrap();
        assert_eq!(
            requests[0].target,
            "/apis/apps/v1/namespaces/pycont/deployments/api/scale"
        );
        assert_eq!(requests[0].header("authorization"), None);
    }

    #[tokio::test]
    async fn patch_sends_merge_patch_with_label() {
        let (addr, server) = spawn_canned(vec![CannedResponse::json(200, "{}")]).await;
        let client = client_for(addr, None);

        client.patch_replicas(&api(), 4).await.unwrap();

        let requests = server.await.unwrap();
        let req = &requests[0];
        assert_eq!(req.method, "PATCH");
        assert_eq!(req.target, "/apis/apps/v1/namespaces/pycont/deployments/api");
        assert_eq!(req.header("content-type"), Some(MERGE_PATCH));

        let body: serde_json::Value = serde_json::from_str(&req.body).unwrap();
        assert_eq!(body["spec"]["replicas"], 4);
        let stamp = body["metadata"]["labels"]["last_scaling"].as_str().unwrap();
        assert!(!stamp.contains(':'));
    }

    #[tokio::test]
    async fn patch_zero_is_rejected_without_request() {
        // Nothing listens here; a request would fail with a transport error.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = client_for(addr, None);

        let err = client.patch_replicas(&api(), 0).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::InvalidReplicas(0)), "got {err:?}");
    }

    #[tokio::test]
    async fn not_found_maps_to_not_found() {
        let body = r#"{"kind":"Status","status":"Failure","message":"deployments.apps \"api\" not found","reason":"NotFound","code":404}"#;
        let (addr, _server) = spawn_canned(vec![CannedResponse::json(404, body)]).await;
        let client = client_for(addr, None);

        let err = client.patch_replicas(&api(), 2).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::NotFound(ref s) if s == "pycont/api"), "got {err:?}");
    }

    #[tokio::test]
    async fn conflict_maps_to_conflict() {
        let body = r#"{"kind":"Status","message":"the object has been modified","reason":"Conflict","code":409}"#;
        let (addr, _server) = spawn_canned(vec![CannedResponse::json(409, body)]).await;
        let client = client_for(addr, None);

        let err = client.patch_replicas(&api(), 2).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::Conflict(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn forbidden_carries_api_message() {
        let body = r#"{"kind":"Status","message":"deployments.apps is forbidden: User \"system:serviceaccount:pycont:default\" cannot list resource","reason":"Forbidden","code":403}"#;
        let (addr, _server) = spawn_canned(vec![CannedResponse::json(403, body)]).await;
        let client = client_for(addr, None);

        match client.list_workloads("pycont").await.unwrap_err() {
            OrchestrationError::Api { status, message } => {
                assert_eq!(status, 403);
                assert!(message.starts_with("deployments.apps is forbidden"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_listing_is_decode_error() {
        let (addr, _server) = spawn_canned(vec![CannedResponse::json(200, "[not json")]).await;
        let client = client_for(addr, None);

        let err = client.list_workloads("pycont").await.unwrap_err();
        assert!(matches!(err, OrchestrationError::Decode(_)), "got {err:?}");
    }

    #[test]
    fn https_access_with_bad_ca_fails_fast() {
        let err = KubernetesClient::new(
            ApiAccess {
                base_url: "https://10.96.0.1:443".to_string(),
                token: Some(BearerToken::Static("t".to_string())),
                ca_pem: Some(b"garbage".to_vec()),
            },
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, OrchestrationError::Transport(HttpError::TlsConfig(_))));
    }

    #[tokio::test]
    async fn rotated_token_file_is_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token");
        std::fs::write(&token_path, "old-token\n").unwrap();

        let listing = r#"{"kind":"DeploymentList","items":[]}"#;
        let (addr, server) = spawn_canned(vec![
            CannedResponse::json(200, listing),
            CannedResponse::json(200, listing),
        ])
        .await;
        let client = KubernetesClient::from_config(&OrchestratorConfig {
            api_server: Some(format!("http://{addr}")),
            token_file: Some(token_path.clone()),
            ..Default::default()
        })
        .unwrap();

        client.list_workloads("pycont").await.unwrap();
        std::fs::write(&token_path, "rotated-token\n").unwrap();
        client.list_workloads("pycont").await.unwrap();

        let requests = server.await.unwrap();
        assert_eq!(requests[0].header("authorization"), Some("Bearer old-token"));
        assert_eq!(requests[1].header("authorization"), Some("Bearer rotated-token"));
    }

    #[tokio::test]
    async fn vanished_token_file_fails_the_call() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token");
        std::fs::write(&token_path, "t").unwrap();
        let client = KubernetesClient::new(
            ApiAccess {
                base_url: "http://127.0.0.1:9".to_string(),
                token: Some(BearerToken::File(token_path.clone())),
                ca_pem: None,
            },
            Duration::from_secs(1),
        )
        .unwrap();

        std::fs::remove_file(&token_path).unwrap();
        let err = client.list_workloads("pycont").await.unwrap_err();
        assert!(matches!(err, OrchestrationError::Credentials(_)), "got {err:?}");
    }

    #[test]
    fn static_token_with_newline_is_rejected() {
        let err = KubernetesClient::new(
            ApiAccess {
                base_url: "http://127.0.0.1:9".to_string(),
                token: Some(BearerToken::Static("a\nb".to_string())),
                ca_pem: None,
            },
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, OrchestrationError::Credentials(_)));
    }
}

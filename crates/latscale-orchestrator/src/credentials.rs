//! API server address and credentials discovery.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use latscale_core::OrchestratorConfig;

use crate::error::{OrchestrationError, OrchestrationResult};
use crate::kubeconfig;

/// Mount point of the pod's service-account secret.
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Where the bearer token comes from.
#[derive(Clone, PartialEq)]
pub enum BearerToken {
    /// Fixed value, e.g. inline in a kubeconfig.
    Static(String),
    /// Re-read on every request. Projected service-account tokens are
    /// rotated in place.
    File(PathBuf),
}

impl BearerToken {
    /// The token to send right now.
    pub async fn current(&self) -> OrchestrationResult<String> {
        match self {
            BearerToken::Static(token) => Ok(token.clone()),
            BearerToken::File(path) => {
                let raw = tokio::fs::read(path)
                    .await
                    .map_err(|e| credentials_error(path, &e.to_string()))?;
                parse_token(path, raw)
            }
        }
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BearerToken::Static(_) => f.write_str("Static(<redacted>)"),
            BearerToken::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

/// Where the API server is and how to authenticate to it.
#[derive(Clone)]
pub struct ApiAccess {
    pub base_url: String,
    pub token: Option<BearerToken>,
    /// PEM bundle trusted for `https` base URLs. `None` falls back to the
    /// public web roots.
    pub ca_pem: Option<Vec<u8>>,
}

impl fmt::Debug for ApiAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiAccess")
            .field("base_url", &self.base_url)
            .field("token", &self.token)
            .field("ca_pem", &self.ca_pem.as_ref().map(|p| p.len()))
            .finish()
    }
}

impl ApiAccess {
    /// Resolve access from config, in order: an explicit API server,
    /// in-cluster discovery, then the user's kubeconfig.
    pub fn from_config(config: &OrchestratorConfig) -> OrchestrationResult<Self> {
        if let Some(url) = &config.api_server {
            return Self::explicit(url, config.token_file.as_deref(), config.ca_file.as_deref());
        }

        let host = std::env::var("KUBERNETES_SERVICE_HOST")
            .ok()
            .filter(|h| !h.is_empty());
        if host.is_some() {
            return Self::in_cluster(
                host,
                std::env::var("KUBERNETES_SERVICE_PORT").ok(),
                Path::new(SERVICE_ACCOUNT_DIR),
                config,
            );
        }

        let home = std::env::var_os("HOME").map(PathBuf::from);
        match kubeconfig::default_path(std::env::var_os("KUBECONFIG"), home) {
            Some(path) => Self::from_kubeconfig(&path, config),
            None => Err(OrchestrationError::Credentials(
                "not running in a cluster and no kubeconfig found; set KUBECONFIG or pass an explicit api server"
                    .to_string(),
            )),
        }
    }

    /// Explicit API server, e.g. `http://127.0.0.1:8001` behind `kubectl proxy`.
    pub fn explicit(
        url: &str,
        token_file: Option<&Path>,
        ca_file: Option<&Path>,
    ) -> OrchestrationResult<Self> {
        let token = token_file.map(token_from_file).transpose()?;
        let ca_pem = ca_file.map(read_file).transpose()?;
        debug!(base_url = %url, token = token.is_some(), "using explicit api server");
        Ok(Self {
            base_url: url.trim_end_matches('/').to_string(),
            token,
            ca_pem,
        })
    }

    /// In-cluster access from the service environment and the mounted
    /// service-account directory. Token and CA paths in `config` override
    /// the mounted defaults.
    pub fn in_cluster(
        host: Option<String>,
        port: Option<String>,
        service_account_dir: &Path,
        config: &OrchestratorConfig,
    ) -> OrchestrationResult<Self> {
        let host = host.filter(|h| !h.is_empty()).ok_or_else(|| {
            OrchestrationError::Credentials(
                "KUBERNETES_SERVICE_HOST is not set; pass an explicit api server when running outside a cluster"
                    .to_string(),
            )
        })?;
        let port = port.filter(|p| !p.is_empty()).unwrap_or_else(|| "443".to_string());
        let host = if host.contains(':') {
            format!("[{host}]")
        } else {
            host
        };

        let token_path = config
            .token_file
            .clone()
            .unwrap_or_else(|| service_account_dir.join("token"));
        let ca_path = config
            .ca_file
            .clone()
            .unwrap_or_else(|| service_account_dir.join("ca.crt"));

        let base_url = format!("https://{host}:{port}");
        debug!(%base_url, "using in-cluster api server");
        Ok(Self {
            base_url,
            token: Some(token_from_file(&token_path)?),
            ca_pem: Some(read_file(&ca_path)?),
        })
    }

    /// Access from the current context of a kubeconfig. Token and CA paths
    /// in `config` override what the kubeconfig says.
    pub fn from_kubeconfig(path: &Path, config: &OrchestratorConfig) -> OrchestrationResult<Self> {
        let mut access = kubeconfig::load(path)?;
        if let Some(token_file) = &config.token_file {
            access.token = Some(token_from_file(token_file)?);
        }
        if let Some(ca_file) = &config.ca_file {
            access.ca_pem = Some(read_file(ca_file)?);
        }
        Ok(access)
    }

    pub fn is_https(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

/// A file-backed token, checked once so a bad path fails at startup.
pub(crate) fn token_from_file(path: &Path) -> OrchestrationResult<BearerToken> {
    read_token(path)?;
    Ok(BearerToken::File(path.to_path_buf()))
}

fn read_token(path: &Path) -> OrchestrationResult<String> {
    parse_token(path, read_file(path)?)
}

fn parse_token(path: &Path, raw: Vec<u8>) -> OrchestrationResult<String> {
    let token = String::from_utf8(raw)
        .map_err(|_| credentials_error(path, "token is not valid utf-8"))?
        .trim()
        .to_string();
    if token.is_empty() {
        return Err(credentials_error(path, "token file is empty"));
    }
    Ok(token)
}

pub(crate) fn read_file(path: &Path) -> OrchestrationResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| credentials_error(path, &e.to_string()))
}

pub(crate) fn credentials_error(path: &Path, reason: &str) -> OrchestrationError {
    OrchestrationError::Credentials(format!("{}: {reason}", path.display()))
}

//! Out-of-cluster access from a kubeconfig file.
//!
//! Only the current context is resolved. Supported: the cluster `server`,
//! `certificate-authority` / `certificate-authority-data`, and a user
//! `token` or `tokenFile`. Client certificates and exec plugins are
//! rejected with a credentials error.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use tracing::debug;

use crate::credentials::{ApiAccess, BearerToken, credentials_error, read_file, token_from_file};
use crate::error::OrchestrationResult;

#[derive(Debug, Deserialize)]
struct Kubeconfig {
    #[serde(rename = "current-context", default)]
    current_context: String,
    #[serde(default)]
    clusters: Vec<NamedCluster>,
    #[serde(default)]
    contexts: Vec<NamedContext>,
    #[serde(default)]
    users: Vec<NamedUser>,
}

#[derive(Debug, Deserialize)]
struct NamedCluster {
    name: String,
    cluster: Cluster,
}

#[derive(Debug, Deserialize)]
struct Cluster {
    server: String,
    #[serde(rename = "certificate-authority", default)]
    certificate_authority: Option<PathBuf>,
    #[serde(rename = "certificate-authority-data", default)]
    certificate_authority_data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NamedContext {
    name: String,
    context: Context,
}

#[derive(Debug, Deserialize)]
struct Context {
    cluster: String,
    #[serde(default)]
    user: String,
}

#[derive(Debug, Deserialize)]
struct NamedUser {
    name: String,
    #[serde(default)]
    user: User,
}

#[derive(Debug, Default, Deserialize)]
struct User {
    #[serde(default)]
    token: Option<String>,
    #[serde(rename = "tokenFile", default)]
    token_file: Option<PathBuf>,
    #[serde(rename = "client-certificate", default)]
    client_certificate: Option<PathBuf>,
    #[serde(rename = "client-certificate-data", default)]
    client_certificate_data: Option<String>,
    #[serde(default)]
    exec: Option<serde_yaml::Value>,
}

impl User {
    fn needs_unsupported_auth(&self) -> bool {
        self.client_certificate.is_some()
            || self.client_certificate_data.is_some()
            || self.exec.is_some()
    }
}

/// Locate the kubeconfig the way `kubectl` does: the first existing entry
/// of `$KUBECONFIG`, else `~/.kube/config`.
pub fn default_path(kubeconfig: Option<OsString>, home: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(list) = kubeconfig.filter(|v| !v.is_empty()) {
        return std::env::split_paths(&list).find(|p| p.is_file());
    }
    home.map(|h| h.join(".kube").join("config"))
        .filter(|p| p.is_file())
}

/// Resolve the current context of the kubeconfig at `path`.
///
/// Relative file references are resolved against the kubeconfig's directory.
pub fn load(path: &Path) -> OrchestrationResult<ApiAccess> {
    let raw = read_file(path)?;
    let config: Kubeconfig = serde_yaml::from_slice(&raw)
        .map_err(|e| credentials_error(path, &format!("invalid kubeconfig: {e}")))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let context_name = &config.current_context;
    if context_name.is_empty() {
        return Err(credentials_error(path, "no current-context set"));
    }
    let context = config
        .contexts
        .iter()
        .find(|c| &c.name == context_name)
        .map(|c| &c.context)
        .ok_or_else(|| credentials_error(path, &format!("context {context_name:?} not found")))?;
    let cluster = config
        .clusters
        .iter()
        .find(|c| c.name == context.cluster)
        .map(|c| &c.cluster)
        .ok_or_else(|| {
            credentials_error(path, &format!("cluster {:?} not found", context.cluster))
        })?;
    let user = config
        .users
        .iter()
        .find(|u| u.name == context.user)
        .map(|u| &u.user);

    let ca_pem = match (&cluster.certificate_authority_data, &cluster.certificate_authority) {
        (Some(data), _) => Some(
            STANDARD
                .decode(data.trim())
                .map_err(|e| credentials_error(path, &format!("certificate-authority-data: {e}")))?,
        ),
        (None, Some(file)) => Some(read_file(&base_dir.join(file))?),
        (None, None) => None,
    };

    let token = match user {
        Some(User {
            token: Some(token), ..
        }) if !token.trim().is_empty() => Some(BearerToken::Static(token.trim().to_string())),
        Some(User {
            token_file: Some(file),
            ..
        }) => Some(token_from_file(&base_dir.join(file))?),
        Some(u) if u.needs_unsupported_auth() => {
            return Err(credentials_error(
                path,
                &format!(
                    "user {:?} uses client-certificate or exec auth, which is not supported; use a token or an explicit api server",
                    context.user
                ),
            ));
        }
        _ => None,
    };

    debug!(
        kubeconfig = %path.display(),
        context = %context_name,
        server = %cluster.server,
        "using kubeconfig"
    );
    Ok(ApiAccess {
        base_url: cluster.server.trim_end_matches('/').to_string(),
        token,
        ca_pem,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrchestrationError;

    fn write_kubeconfig(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("config");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn current_context_with_inline_token_and_ca() {
        let dir = tempfile::tempdir().unwrap();
        let ca = STANDARD.encode("-----BEGIN CERTIFICATE-----\n");
        let path = write_kubeconfig(
            dir.path(),
            &format!(
                r#"
apiVersion: v1
kind: Config
current-context: dev
clusters:
- name: other
  cluster:
    server: https://10.0.0.9:6443
- name: kind
  cluster:
    server: https://127.0.0.1:6443/
    certificate-authority-data: {ca}
contexts:
- name: prod
  context: {{cluster: other, user: admin}}
- name: dev
  context:
    cluster: kind
    user: dev-user
    namespace: pycont
users:
- name: admin
  user: {{token: wrong}}
- name: dev-user
  user:
    token: kc-token
"#
            ),
        );

        let access = load(&path).unwrap();
        assert_eq!(access.base_url, "https://127.0.0.1:6443");
        assert_eq!(access.token, Some(BearerToken::Static("kc-token".to_string())));
        assert_eq!(access.ca_pem.as_deref(), Some(&b"-----BEGIN CERTIFICATE-----\n"[..]));
    }

    #[test]
    fn relative_files_resolve_against_kubeconfig_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ca.crt"), "pem").unwrap();
        std::fs::write(dir.path().join("token"), "file-token\n").unwrap();
        let path = write_kubeconfig(
            dir.path(),
            r#"
current-context: local
clusters:
- name: local
  cluster:
    server: https://api.local:6443
    certificate-authority: ca.crt
contexts:
- name: local
  context: {cluster: local, user: me}
users:
- name: me
  user:
    tokenFile: token
"#,
        );

        let access = load(&path).unwrap();
        assert_eq!(access.ca_pem.as_deref(), Some(&b"pem"[..]));
        assert_eq!(access.token, Some(BearerToken::File(dir.path().join("token"))));
    }

    #[test]
    fn user_without_credentials_sends_no_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_kubeconfig(
            dir.path(),
            r#"
current-context: proxy
clusters:
- name: proxy
  cluster: {server: "http://127.0.0.1:8001"}
contexts:
- name: proxy
  context: {cluster: proxy}
"#,
        );

        let access = load(&path).unwrap();
        assert_eq!(access.base_url, "http://127.0.0.1:8001");
        assert!(access.token.is_none());
        assert!(access.ca_pem.is_none());
    }

    #[test]
    fn missing_current_context_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_kubeconfig(dir.path(), "clusters: []\ncontexts: []\n");
        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains("current-context"), "got {err}");
    }

    #[test]
    fn unknown_context_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_kubeconfig(dir.path(), "current-context: gone\ncontexts: []\n");
        assert!(matches!(load(&path), Err(OrchestrationError::Credentials(_))));
    }

    #[test]
    fn client_certificate_user_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_kubeconfig(
            dir.path(),
            r#"
current-context: c
clusters:
- name: c
  cluster: {server: "https://api:6443"}
contexts:
- name: c
  context: {cluster: c, user: u}
users:
- name: u
  user:
    client-certificate-data: AAAA
    client-key-data: BBBB
"#,
        );
        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains("not supported"), "got {err}");
    }

    #[test]
    fn malformed_yaml_is_credentials_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_kubeconfig(dir.path(), "current-context: [unterminated");
        assert!(matches!(load(&path), Err(OrchestrationError::Credentials(_))));
    }

    #[test]
    fn default_path_prefers_first_existing_kubeconfig_entry() {
        let dir = tempfile::tempdir().unwrap();
        let present = write_kubeconfig(dir.path(), "current-context: x\n");
        let missing = dir.path().join("missing");
        let list = std::env::join_paths([&missing, &present]).unwrap();

        assert_eq!(default_path(Some(list), None), Some(present));
    }

    #[test]
    fn default_path_falls_back_to_home() {
        let home = tempfile::tempdir().unwrap();
        std::fs::create_dir(home.path().join(".kube")).unwrap();
        let config = home.path().join(".kube").join("config");
        std::fs::write(&config, "current-context: x\n").unwrap();

        assert_eq!(
            default_path(None, Some(home.path().to_path_buf())),
            Some(config.clone())
        );
        assert_eq!(
            default_path(Some(OsString::new()), Some(home.path().to_path_buf())),
            Some(config)
        );
    }

    #[test]
    fn default_path_none_when_nothing_exists() {
        let home = tempfile::tempdir().unwrap();
        assert_eq!(default_path(None, Some(home.path().to_path_buf())), None);
        assert_eq!(default_path(None, None), None);
    }
}

//! rustls client configurations.

use std::sync::Arc;

use rustls::{ClientConfig, RootCertStore};

use crate::error::{HttpError, HttpResult};

/// TLS config trusting the Mozilla root store.
pub fn webpki_roots_config() -> HttpResult<Arc<ClientConfig>> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    build(roots)
}

/// TLS config trusting only the certificates in a PEM bundle.
///
/// Used for the cluster CA mounted into service-account pods.
pub fn ca_pem_config(pem: &[u8]) -> HttpResult<Arc<ClientConfig>> {
    let mut roots = RootCertStore::empty();
    let mut reader = pem;
    for cert in rustls_pemfile::certs(&mut reader) {
        let cert = cert.map_err(|e| HttpError::TlsConfig(format!("read ca pem: {e}")))?;
        roots
            .add(cert)
            .map_err(|e| HttpError::TlsConfig(format!("add ca certificate: {e}")))?;
    }
    if roots.is_empty() {
        return Err(HttpError::TlsConfig(
            "ca bundle contains no certificates".to_string(),
        ));
    }
    build(roots)
}

fn build(roots: RootCertStore) -> HttpResult<Arc<ClientConfig>> {
    let config = ClientConfig::builder_with_provider(rustls::crypto::ring::default_provider().into())
        .with_safe_default_protocol_versions()
        .map_err(|e| HttpError::TlsConfig(format!("protocol versions: {e}")))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Arc::new(config))
}

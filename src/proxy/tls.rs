//! TLS client setup for `https` destinations.

use std::sync::Arc;

use rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

/// Builds a connector that verifies destinations against the webpki roots.
pub fn connector() -> Result<TlsConnector, rustls::Error> {
    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()?
        .with_root_certificates(root_store)
        .with_no_client_auth();

    tracing::debug!(roots = webpki_roots::TLS_SERVER_ROOTS.len(), "TLS client configured");
    Ok(TlsConnector::from(Arc::new(config)))
}

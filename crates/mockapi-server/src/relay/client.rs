//! Outbound HTTP client for relayed requests.

use crate::body::ServeBody;
use crate::config::RelayConfig;
use crate::tls::{install_crypto_provider, NoVerifier};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub type HttpClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, ServeBody>;

/// Create the shared, pooled relay client (HTTP/1.1, http and https targets).
pub fn create_http_client(config: &RelayConfig) -> HttpClient {
    install_crypto_provider();

    let mut http_connector = HttpConnector::new();
    http_connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
    http_connector.enforce_http(false);

    let builder = if config.tls_skip_verify {
        warn!("TLS certificate verification DISABLED for relayed requests (development/testing only)");
        hyper_rustls::HttpsConnectorBuilder::new().with_tls_config(
            rustls::ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoVerifier))
                .with_no_client_auth(),
        )
    } else {
        match hyper_rustls::HttpsConnectorBuilder::new().with_native_roots() {
            Ok(builder) => builder,
            Err(e) => {
                warn!("No native root certificates ({}); https relays will fail", e);
                hyper_rustls::HttpsConnectorBuilder::new().with_tls_config(
                    rustls::ClientConfig::builder()
                        .with_root_certificates(rustls::RootCertStore::empty())
                        .with_no_client_auth(),
                )
            }
        }
    };

    let https_connector = builder
        .https_or_http()
        .enable_http1()
        .wrap_connector(http_connector);

    let client = Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
        .pool_max_idle_per_host(config.max_idle_per_host)
        .build(https_connector);

    info!(
        "Relay client configured (HTTP/1.1): timeout={}s, connect_timeout={}s, max_idle={}",
        config.timeout_secs, config.connect_timeout_secs, config.max_idle_per_host
    );

    client
}

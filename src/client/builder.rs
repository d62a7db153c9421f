//! translation of a [`Config`] into the pooled transport shared by every request of a run
use super::connector::{Connector, ConnectorSettings, HostLimits, Routes};
use super::proxy::Proxies;
use crate::config::Config;
use crate::error::FuffaError;

use std::fs;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use native_tls::{Identity, Protocol, TlsConnector};
use tracing::{error, instrument, warn};

/// idle connections kept open per host
const MAX_IDLE_PER_HOST: usize = 500;

/// the pooled client requests are sent through
pub(super) type HttpClient = Client<Connector, Full<Bytes>>;

/// everything an [`AsyncClient`] needs to put requests on the wire
///
/// `direct` dials each uri's own authority; `routed` dials the authorities
/// registered in `routes`, which lets a `Host` header name the server while the
/// connection still goes to the url's host
///
/// [`AsyncClient`]: super::AsyncClient
pub(super) struct Transport {
    pub(super) direct: HttpClient,
    pub(super) routed: HttpClient,
    pub(super) routes: Arc<Routes>,
    pub(super) proxies: Arc<Proxies>,
}

/// build the transport shared by every request of a run
///
/// `proxy` is the explicit proxy to use, if any; when absent, or when it can't be
/// used, environment proxies apply
#[instrument(skip_all, level = "trace")]
pub(super) fn build_transport(config: &Config, proxy: Option<&str>) -> Result<Transport, FuffaError> {
    let proxies = Arc::new(Proxies::new(proxy));
    let routes = Arc::new(Routes::default());

    let settings = Arc::new(ConnectorSettings {
        tls: tls_connector(config)?,
        proxies: Arc::clone(&proxies),
        sni: config.sni.clone(),
        timeout: config.timeout_duration(),
        limits: Arc::new(HostLimits::default()),
    });

    let direct = pooled(Connector::new(Arc::clone(&settings), None));
    let routed = pooled(Connector::new(settings, Some(Arc::clone(&routes))));

    Ok(Transport {
        direct,
        routed,
        routes,
        proxies,
    })
}

fn pooled(connector: Connector) -> HttpClient {
    Client::builder(TokioExecutor::new())
        .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
        .pool_timer(TokioTimer::new())
        .http1_title_case_headers(true)
        .set_host(false)
        .build(connector)
}

/// TLS settings: no certificate or hostname verification, the configured
/// protocol floor, the client identity when one loads, and h2 offered over
/// ALPN when HTTP/2 is enabled
fn tls_connector(config: &Config) -> Result<tokio_native_tls::TlsConnector, FuffaError> {
    let floor = config.tls_min_version.to_protocol().unwrap_or_else(|| {
        warn!("the tls backend can't require TLS 1.3; using TLS 1.2 as the floor instead");
        Protocol::Tlsv12
    });

    let mut builder = TlsConnector::builder();

    builder
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .min_protocol_version(Some(floor));

    if config.http2 {
        builder.request_alpns(&["h2", "http/1.1"]);
    }

    if let Some(identity) = load_identity(config) {
        builder.identity(identity);
    }

    let connector = builder.build().map_err(|source| {
        error!(%source, "could not build the tls connector");

        FuffaError::ClientBuildError { source }
    })?;

    Ok(tokio_native_tls::TlsConnector::from(connector))
}

/// read the configured client certificate and key; any failure is logged and
/// the client goes on without an identity
fn load_identity(config: &Config) -> Option<Identity> {
    let (Some(cert_path), Some(key_path)) = (&config.client_cert, &config.client_key) else {
        return None;
    };

    let cert = match fs::read(cert_path) {
        Ok(cert) => cert,
        Err(source) => {
            warn!(path = %cert_path.display(), %source, "could not read client certificate");
            return None;
        }
    };

    let key = match fs::read(key_path) {
        Ok(key) => key,
        Err(source) => {
            warn!(path = %key_path.display(), %source, "could not read client key");
            return None;
        }
    };

    match Identity::from_pkcs8(&cert, &key) {
        Ok(identity) => Some(identity),
        Err(source) => {
            warn!(%source, "client certificate and key don't form a usable identity");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TlsVersion;
    use std::path::PathBuf;

    #[tokio::test]
    async fn default_config_builds_a_transport() {
        assert!(build_transport(&Config::default(), None).is_ok());
    }

    #[tokio::test]
    async fn bad_proxy_and_missing_identity_still_build_a_transport() {
        let config = Config {
            client_cert: Some(PathBuf::from("/nonexistent/cert.pem")),
            client_key: Some(PathBuf::from("/nonexistent/key.pem")),
            sni: Some(String::from("example.com")),
            http2: true,
            follow_redirects: true,
            tls_min_version: TlsVersion::V1_3,
            ..Config::default()
        };

        assert!(load_identity(&config).is_none());
        assert!(build_transport(&config, Some("::not a proxy::")).is_ok());
    }

    #[test]
    fn identity_requires_both_halves() {
        let config = Config {
            client_cert: Some(PathBuf::from("cert.pem")),
            ..Config::default()
        };

        assert!(load_identity(&config).is_none());
    }

    #[test]
    fn unusable_identity_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");
        fs::write(&cert, "not a certificate").unwrap();
        fs::write(&key, "not a key").unwrap();

        let config = Config {
            client_cert: Some(cert),
            client_key: Some(key),
            ..Config::default()
        };

        assert!(load_identity(&config).is_none());
    }
}

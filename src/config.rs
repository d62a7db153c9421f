//! Run-wide settings consumed by [`Wordlist`] and [`AsyncClient`]
//!
//! Loading these values (from flags, files, or the environment) is left to
//! the caller; this module only describes their shape and defaults.
//!
//! [`Wordlist`]: crate::corpora::Wordlist
//! [`AsyncClient`]: crate::client::AsyncClient
#![allow(clippy::struct_excessive_bools)]
use std::path::PathBuf;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// lowest TLS protocol version the client is willing to negotiate
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
#[non_exhaustive]
pub enum TlsVersion {
    /// TLS 1.0
    #[default]
    V1_0,

    /// TLS 1.1
    V1_1,

    /// TLS 1.2
    V1_2,

    /// TLS 1.3
    V1_3,
}

impl TlsVersion {
    /// the matching floor understood by the tls backend; the backend can't
    /// require TLS 1.3, so that floor comes back as `None`
    pub(crate) const fn to_protocol(self) -> Option<native_tls::Protocol> {
        match self {
            Self::V1_0 => Some(native_tls::Protocol::Tlsv10),
            Self::V1_1 => Some(native_tls::Protocol::Tlsv11),
            Self::V1_2 => Some(native_tls::Protocol::Tlsv12),
            Self::V1_3 => None,
        }
    }
}

/// configuration shared by the payload and execution stages of a run
///
/// # Examples
///
/// ```
/// # use fuffa::config::Config;
/// let config = Config {
///     extensions: vec![String::from("php"), String::from(".html")],
///     wordlist_limit: 1000,
///     ..Config::default()
/// };
///
/// assert_eq!(config.timeout, 10);
/// assert!(!config.capture_raw());
/// ```
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug)]
pub struct Config {
    /// extensions used to expand wordlist entries
    pub extensions: Vec<String>,

    /// expand `%EXT%` placeholders instead of deriving extension variants
    pub dir_search_compat: bool,

    /// maximum number of wordlist lines to accept; 0 means unlimited
    pub wordlist_limit: usize,

    /// explicit proxy for normal requests
    pub proxy_url: Option<String>,

    /// explicit proxy for the replay client
    pub replay_proxy_url: Option<String>,

    /// PEM encoded client certificate
    pub client_cert: Option<PathBuf>,

    /// PEM encoded (PKCS#8) private key for `client_cert`
    pub client_key: Option<PathBuf>,

    /// connect and overall request timeout, in seconds; 0 disables both
    pub timeout: u64,

    /// send the url as given, without normalization
    pub raw: bool,

    /// attempt to negotiate HTTP/2
    pub http2: bool,

    /// server name to present during the TLS handshake
    pub sni: Option<String>,

    /// follow redirects instead of surfacing the first response
    pub follow_redirects: bool,

    /// directory where matched results are persisted
    pub output_directory: Option<PathBuf>,

    /// file where every request/response pair is logged
    pub audit_log: Option<PathBuf>,

    /// never download response bodies
    pub ignore_body: bool,

    /// print the first request/response pair
    pub debug_first_request: bool,

    /// print the next request/response pair, regardless of `debug_first_request`
    pub force_debug_next: bool,

    /// lowest TLS version to negotiate
    pub tls_min_version: TlsVersion,

    /// fired by the caller to abandon in-flight requests
    #[cfg_attr(feature = "serde", serde(skip))]
    pub cancel: CancellationToken,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extensions: Vec::new(),
            dir_search_compat: false,
            wordlist_limit: 0,
            proxy_url: None,
            replay_proxy_url: None,
            client_cert: None,
            client_key: None,
            timeout: 10,
            raw: false,
            http2: false,
            sni: None,
            follow_redirects: false,
            output_directory: None,
            audit_log: None,
            ignore_body: false,
            debug_first_request: false,
            force_debug_next: false,
            tls_min_version: TlsVersion::default(),
            cancel: CancellationToken::new(),
        }
    }
}

impl Config {
    /// create a default `Config`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// whether raw wire-format request/response text should be captured
    ///
    /// raw dumps are only needed when something downstream persists them
    #[must_use]
    pub const fn capture_raw(&self) -> bool {
        self.output_directory.is_some() || self.audit_log.is_some()
    }

    /// [`Config::timeout`] as a [`Duration`], or `None` when timeouts are disabled
    #[must_use]
    pub const fn timeout_duration(&self) -> Option<Duration> {
        if self.timeout == 0 {
            return None;
        }

        Some(Duration::from_secs(self.timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_raw_follows_output_and_audit_settings() {
        let mut config = Config::new();
        assert!(!config.capture_raw());

        config.audit_log = Some(PathBuf::from("audit.log"));
        assert!(config.capture_raw());

        config.audit_log = None;
        config.output_directory = Some(PathBuf::from("out"));
        assert!(config.capture_raw());
    }

    #[test]
    fn timeout_is_expressed_in_seconds() {
        let config = Config {
            timeout: 3,
            ..Config::default()
        };
        assert_eq!(config.timeout_duration(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn zero_timeout_disables_timeouts() {
        let config = Config {
            timeout: 0,
            ..Config::default()
        };
        assert_eq!(config.timeout_duration(), None);
    }

    #[test]
    fn tls_floor_maps_onto_backend_protocols() {
        assert!(matches!(
            TlsVersion::default().to_protocol(),
            Some(native_tls::Protocol::Tlsv10)
        ));
        assert!(TlsVersion::V1_3.to_protocol().is_none());
    }
}

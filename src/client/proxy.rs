//! proxy selection: an explicit proxy url, or the conventional environment variables
use std::env;
use std::net::IpAddr;

use base64::{engine::general_purpose, Engine as _};
use http::HeaderValue;
use tracing::{debug, warn};
use url::Url;

/// a proxy connections can be routed through
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct ProxyTarget {
    /// `host:port` to dial
    authority: String,

    /// `Basic` credentials taken from the proxy url's userinfo
    auth: Option<HeaderValue>,
}

impl ProxyTarget {
    /// parse an `http://[user:pass@]host[:port]` proxy url
    ///
    /// any other scheme, or a url without a host, yields `None`
    fn parse(proxy_url: &str) -> Option<Self> {
        let url = match Url::parse(proxy_url) {
            Ok(url) => url,
            Err(source) => {
                warn!(%proxy_url, %source, "could not parse proxy url");
                return None;
            }
        };

        if url.scheme() != "http" {
            warn!(%proxy_url, scheme = url.scheme(), "only http proxies are supported");
            return None;
        }

        let host = url.host_str()?;
        let port = url.port_or_known_default().unwrap_or(80);

        let auth = if url.username().is_empty() {
            None
        } else {
            let credentials = format!("{}:{}", url.username(), url.password().unwrap_or_default());
            let encoded = general_purpose::STANDARD.encode(credentials);

            HeaderValue::from_str(&format!("Basic {encoded}")).ok()
        };

        Some(Self {
            authority: format!("{host}:{port}"),
            auth,
        })
    }

    /// `host:port` of the proxy itself
    pub(super) fn authority(&self) -> &str {
        &self.authority
    }

    /// value for a `Proxy-Authorization` header, if the proxy url carried credentials
    pub(super) const fn auth(&self) -> Option<&HeaderValue> {
        self.auth.as_ref()
    }
}

/// which proxy, if any, a connection should go through
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(super) struct Proxies {
    http: Option<ProxyTarget>,
    https: Option<ProxyTarget>,
    no_proxy: Vec<String>,

    /// an explicit proxy applies to every target, loopback included
    explicit: bool,
}

impl Proxies {
    /// use `proxy_url` when it is given and usable; otherwise fall back to
    /// `HTTP_PROXY`, `HTTPS_PROXY`, and `NO_PROXY` (in either case)
    pub(super) fn new(proxy_url: Option<&str>) -> Self {
        if let Some(target) = proxy_url.and_then(ProxyTarget::parse) {
            debug!(proxy = target.authority(), "routing every request through the given proxy");

            return Self {
                http: Some(target.clone()),
                https: Some(target),
                no_proxy: Vec::new(),
                explicit: true,
            };
        }

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// build the environment-derived proxies, reading variables through `lookup`
    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |upper: &str, lower: &str| {
            lookup(upper)
                .or_else(|| lookup(lower))
                .filter(|value| !value.trim().is_empty())
        };

        let no_proxy = read("NO_PROXY", "no_proxy")
            .map(|value| {
                value
                    .split(',')
                    .map(|entry| entry.trim().to_ascii_lowercase())
                    .filter(|entry| !entry.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            http: read("HTTP_PROXY", "http_proxy").and_then(|value| ProxyTarget::parse(&value)),
            https: read("HTTPS_PROXY", "https_proxy").and_then(|value| ProxyTarget::parse(&value)),
            no_proxy,
            explicit: false,
        }
    }

    /// the proxy to use for a connection to `host`, if any
    pub(super) fn for_target(&self, secure: bool, host: &str) -> Option<&ProxyTarget> {
        let proxy = if secure { &self.https } else { &self.http };
        let proxy = proxy.as_ref()?;

        if self.explicit || self.uses_proxy(host) {
            return Some(proxy);
        }

        None
    }

    /// whether an environment proxy applies to `host`; loopback targets and
    /// `NO_PROXY` matches always go direct
    fn uses_proxy(&self, host: &str) -> bool {
        let host = host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_ascii_lowercase();

        if host == "localhost" || host.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback()) {
            return false;
        }

        !self.no_proxy.iter().any(|entry| {
            if entry == "*" {
                return true;
            }

            let entry = entry.trim_start_matches('.');

            host == entry || host.ends_with(&format!(".{entry}"))
        })
    }
}

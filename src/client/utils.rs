use super::MAX_DOWNLOAD_SIZE;
use crate::error::{FuffaError, RequestErrorKind};
use crate::requests::Request;

use std::error::Error;
use std::io;

use http::header::CONTENT_LENGTH;
use http::uri::Authority;
use http::{HeaderMap, Uri};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use tracing::{error, instrument};
use url::{Position, Url};

/// `User-Agent` sent with every request that doesn't bring its own
pub const DEFAULT_USER_AGENT: &str = concat!(
    "FUFFA - FFUF Using Fantastic Formats And colors v",
    env!("CARGO_PKG_VERSION")
);

/// bytes that can't appear in a request target as-is; everything else, dot
/// segments and existing escapes included, is sent the way it was written
const TARGET_ESCAPES: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// where a request goes: the url's scheme and authority, plus its request
/// target (path and query) taken from the url text without normalization
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct RequestTarget {
    url: Url,
    authority: String,
    path: String,
}

impl RequestTarget {
    /// split `url` into its parts
    ///
    /// the url must parse and use `http` or `https`; the path and query are
    /// lifted from `url` itself so that payloads like `../` or `%2e` survive.
    /// Unless `raw` is set, bytes that can't appear on the request line are
    /// percent-encoded
    pub(super) fn parse(url: &str, raw: bool) -> Result<Self, FuffaError> {
        let parsed = parse_url(url)?;

        if !matches!(parsed.scheme(), "http" | "https") || !parsed.has_host() {
            error!(%url, "only http(s) urls with a host can be requested");

            return Err(FuffaError::InvalidRequestTarget {
                url: url.to_string(),
                reason: String::from("only http and https urls with a host are supported"),
            });
        }

        let authority = parsed[Position::BeforeHost..Position::AfterPort].to_string();

        let literal = literal_target(url);

        let path = if raw {
            literal
        } else {
            utf8_percent_encode(&literal, TARGET_ESCAPES).to_string()
        };

        Ok(Self {
            url: parsed,
            authority,
            path,
        })
    }

    /// resolve a redirect's `Location` against this target
    pub(super) fn join(&self, location: &str, raw: bool) -> Result<Self, FuffaError> {
        let joined = self.url.join(location).map_err(|source| {
            error!(%location, %source, "could not resolve redirect location");

            FuffaError::InvalidUrl {
                source,
                url: location.to_string(),
            }
        })?;

        Self::parse(joined.as_str(), raw)
    }

    /// `host[:port]`, as written in the url
    pub(super) fn authority(&self) -> &str {
        &self.authority
    }

    /// the host, with brackets around ipv6 addresses
    pub(super) fn host(&self) -> &str {
        &self.url[Position::BeforeHost..Position::AfterHost]
    }

    /// the port, explicit or implied by the scheme
    pub(super) fn port(&self) -> u16 {
        self.url.port_or_known_default().unwrap_or(80)
    }

    pub(super) fn is_secure(&self) -> bool {
        self.url.scheme() == "https"
    }

    /// the request target put on the request line
    pub(super) fn path(&self) -> &str {
        &self.path
    }

    /// absolute uri for this target, addressed to `authority`
    pub(super) fn uri(&self, authority: &str) -> Result<Uri, FuffaError> {
        let uri = format!("{}://{authority}{}", self.url.scheme(), self.path);

        Uri::try_from(uri.as_str()).map_err(|source| {
            error!(%uri, %source, "request target can't be put on the wire");

            FuffaError::InvalidRequestTarget {
                url: uri.clone(),
                reason: source.to_string(),
            }
        })
    }
}

/// everything after the url's authority and before its fragment; `/` when empty
fn literal_target(url: &str) -> String {
    let after_scheme = url.find("://").map_or(url, |index| &url[index + 3..]);
    let start = after_scheme
        .find(['/', '?', '#'])
        .unwrap_or(after_scheme.len());

    let rest = &after_scheme[start..];
    let rest = rest.split_once('#').map_or(rest, |(before, _)| before);

    if rest.is_empty() {
        String::from("/")
    } else if rest.starts_with('?') {
        format!("/{rest}")
    } else {
        rest.to_string()
    }
}

/// parse the request's url, logging and wrapping any failure
pub(super) fn parse_url(url: &str) -> Result<Url, FuffaError> {
    Url::parse(url).map_err(|source| {
        error!(%url, %source, "could not parse the request's url");

        FuffaError::InvalidUrl {
            source,
            url: url.to_string(),
        }
    })
}

/// the host named by a `Host` header value, if the value is a usable authority
pub(super) fn host_header_name(value: &str) -> Option<String> {
    value
        .parse::<Authority>()
        .ok()
        .map(|authority| authority.host().to_string())
}

/// fill in the `User-Agent` header when missing and record the authority the
/// request is addressed to
///
/// an explicit `Host` header wins over the url's authority
pub(super) fn apply_defaults(request: &mut Request, target: &RequestTarget) {
    if !request.has_header("User-Agent") {
        request.add_header("User-Agent", DEFAULT_USER_AGENT);
    }

    request.host = request
        .header("Host")
        .map_or_else(|| target.authority().to_string(), ToString::to_string);
}

/// the `Content-Length` a response declared, if it is present and numeric
pub(super) fn declared_length(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

/// whether a body with the declared length should be left on the wire
pub(super) const fn should_cancel(declared: i64, ignore_body: bool) -> bool {
    ignore_body || declared > MAX_DOWNLOAD_SIZE
}

/// `source` and everything it wraps, joined with `: `
fn error_chain(source: &dyn Error) -> String {
    let mut message = source.to_string();
    let mut cause = source.source();

    while let Some(inner) = cause {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        cause = inner.source();
    }

    message
}

/// whether anything in `source`'s chain is an io timeout
fn timed_out(source: &(dyn Error + 'static)) -> bool {
    let mut cause = Some(source);

    while let Some(inner) = cause {
        if inner
            .downcast_ref::<io::Error>()
            .is_some_and(|io_error| io_error.kind() == io::ErrorKind::TimedOut)
        {
            return true;
        }

        cause = inner.source();
    }

    false
}

/// internal helper to convert a failed exchange into a [`FuffaError`]
#[instrument(skip_all, level = "trace")]
pub(super) fn send_error(source: &hyper_util::client::legacy::Error) -> FuffaError {
    let kind = if timed_out(source) {
        RequestErrorKind::Timeout
    } else if source.is_connect() {
        RequestErrorKind::Connect(None)
    } else {
        RequestErrorKind::Request(None)
    };

    request_error(kind, &error_chain(source))
}

/// log and wrap a [`FuffaError::RequestError`]
pub(super) fn request_error(kind: RequestErrorKind, message: &str) -> FuffaError {
    error!(?kind, "error occurred while sending request: {}", message);

    FuffaError::RequestError {
        kind,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn bodies_over_the_ceiling_or_ignored_are_cancelled() {
        assert!(!should_cancel(0, false));
        assert!(!should_cancel(MAX_DOWNLOAD_SIZE, false));
        assert!(should_cancel(MAX_DOWNLOAD_SIZE + 1, false));
        assert!(should_cancel(0, true));
    }

    #[test]
    fn declared_length_requires_a_number() {
        let mut headers = HeaderMap::new();
        assert_eq!(declared_length(&headers), None);

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("nope"));
        assert_eq!(declared_length(&headers), None);

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("1337"));
        assert_eq!(declared_length(&headers), Some(1337));
    }

    #[test]
    fn defaults_add_user_agent_and_authority() {
        let target = RequestTarget::parse("http://localhost:8080/path?q=1", false).unwrap();
        let mut request = Request::new("GET", "http://localhost:8080/path?q=1");

        apply_defaults(&mut request, &target);

        assert_eq!(request.header("user-agent"), Some(DEFAULT_USER_AGENT));
        assert_eq!(request.host(), "localhost:8080");
    }

    #[test]
    fn user_agent_names_the_tool_and_version() {
        assert_eq!(
            DEFAULT_USER_AGENT,
            format!(
                "FUFFA - FFUF Using Fantastic Formats And colors v{}",
                env!("CARGO_PKG_VERSION")
            )
        );
    }

    #[test]
    fn defaults_respect_existing_user_agent_and_host() {
        let target = RequestTarget::parse("https://10.0.0.1/", false).unwrap();
        let mut request = Request::new("GET", "https://10.0.0.1/");
        request.add_header("user-agent", "custom");
        request.add_header("Host", "vhost.example");

        apply_defaults(&mut request, &target);

        assert_eq!(request.header("User-Agent"), Some("custom"));
        assert_eq!(request.headers().len(), 2);
        assert_eq!(request.host(), "vhost.example");
    }

    #[test]
    fn unparseable_urls_are_rejected() {
        assert!(matches!(
            RequestTarget::parse("not a url", false),
            Err(FuffaError::InvalidUrl { .. })
        ));
        assert!(matches!(
            RequestTarget::parse("ftp://example.com/file", false),
            Err(FuffaError::InvalidRequestTarget { .. })
        ));
    }

    #[test]
    fn dot_segments_are_kept_in_the_request_target() {
        let target =
            RequestTarget::parse("http://example.com/static/../../etc/passwd", false).unwrap();
        assert_eq!(target.path(), "/static/../../etc/passwd");

        let target = RequestTarget::parse("http://example.com/a/./b/%2e%2e/c", true).unwrap();
        assert_eq!(target.path(), "/a/./b/%2e%2e/c");
    }

    #[test]
    fn request_target_defaults_to_root_and_drops_fragments() {
        let target = RequestTarget::parse("http://example.com", false).unwrap();
        assert_eq!(target.path(), "/");

        let target = RequestTarget::parse("http://example.com?q=1#top", false).unwrap();
        assert_eq!(target.path(), "/?q=1");

        let target = RequestTarget::parse("http://user:pw@example.com:8080/x?y#z", false).unwrap();
        assert_eq!(target.path(), "/x?y");
        assert_eq!(target.authority(), "example.com:8080");
        assert_eq!(target.port(), 8080);
    }

    #[test]
    fn unsafe_bytes_are_escaped_unless_raw() {
        let target = RequestTarget::parse("http://example.com/a b/<c>", false).unwrap();
        assert_eq!(target.path(), "/a%20b/%3Cc%3E");

        let target = RequestTarget::parse("http://example.com/é", false).unwrap();
        assert_eq!(target.path(), "/%C3%A9");

        let target = RequestTarget::parse("http://example.com/{x}", true).unwrap();
        assert_eq!(target.path(), "/{x}");
    }

    #[test]
    fn uris_keep_the_literal_target() {
        let target = RequestTarget::parse("https://10.0.0.1:8443/../admin?x=1", false).unwrap();

        let uri = target.uri("vhost.example:8443").unwrap();
        assert_eq!(uri.to_string(), "https://vhost.example:8443/../admin?x=1");
        assert_eq!(target.host(), "10.0.0.1");
        assert!(target.is_secure());
    }

    #[test]
    fn raw_targets_the_wire_format_rejects_are_errors() {
        let target = RequestTarget::parse("http://example.com/a b", true).unwrap();

        assert!(matches!(
            target.uri(target.authority()),
            Err(FuffaError::InvalidRequestTarget { .. })
        ));
    }

    #[test]
    fn redirects_resolve_against_the_current_target() {
        let target = RequestTarget::parse("http://example.com/a/b?c", false).unwrap();

        let next = target.join("../login", false).unwrap();
        assert_eq!(next.path(), "/login");

        let next = target.join("https://other.example/", false).unwrap();
        assert_eq!(next.authority(), "other.example");
        assert!(next.is_secure());
    }

    #[test]
    fn host_header_names_exclude_the_port() {
        assert_eq!(host_header_name("vhost.example:8443").as_deref(), Some("vhost.example"));
        assert_eq!(host_header_name("vhost.example").as_deref(), Some("vhost.example"));
        assert_eq!(host_header_name("[::1]:80").as_deref(), Some("[::1]"));
        assert_eq!(host_header_name("bad host"), None);
    }

    #[test]
    fn timeouts_are_found_anywhere_in_the_chain() {
        #[derive(Debug)]
        struct Wrapper(io::Error);

        impl std::fmt::Display for Wrapper {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "wrapped")
            }
        }

        impl Error for Wrapper {
            fn source(&self) -> Option<&(dyn Error + 'static)> {
                Some(&self.0)
            }
        }

        let wrapped = Wrapper(io::Error::new(io::ErrorKind::TimedOut, "too slow"));

        assert!(timed_out(&wrapped));
        assert_eq!(error_chain(&wrapped), "wrapped: too slow");
        assert!(!timed_out(&io::Error::new(io::ErrorKind::Other, "nope")));
    }
}

use super::builder::{build_transport, HttpClient, Transport};
use super::connector::Routes;
use super::decode::decode_body;
use super::proxy::Proxies;
use super::raw::{dump_request, dump_response};
use super::timing::ConnTimer;
use super::utils::{
    apply_defaults, declared_length, host_header_name, request_error, send_error, should_cancel,
    RequestTarget,
};
use super::Runner;
use crate::atomic_store;
use crate::config::Config;
use crate::debug;
use crate::error::{FuffaError, RequestErrorKind};
use crate::requests::Request;
use crate::responses::Response;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{
    AUTHORIZATION, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, HOST, LOCATION,
    PROXY_AUTHORIZATION, WWW_AUTHENTICATE,
};
use http::response::Parts;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use tracing::{debug, error, instrument, warn};
use url::Url;

/// redirects followed before giving up, when following is enabled
const MAX_REDIRECTS: usize = 10;

/// a response head with its still unread body, and the first-byte timing the
/// connection recorded for it
struct Exchanged {
    head: Parts,
    body: Incoming,
    first_byte: Option<(SystemTime, Duration)>,
}

/// concrete [`Runner`] built on a pooled [`hyper`] client
///
/// cloning an `AsyncClient` is cheap; clones share the connection pool and the
/// debug flags
///
/// # Examples
///
/// ```
/// # use fuffa::client::{AsyncClient, Runner};
/// # use fuffa::config::Config;
/// # use fuffa::error::FuffaError;
/// # use fuffa::requests::{InputMap, Request};
/// use httpmock::prelude::*;
/// # #[tokio::main]
/// # async fn main() -> Result<(), FuffaError> {
/// let server = MockServer::start_async().await;
/// let mocked = server
///     .mock_async(|when, then| {
///         when.method(GET).path("/admin");
///         then.status(200).body("welcome back");
///     })
///     .await;
///
/// let client = AsyncClient::new(Config::default())?;
///
/// let base = Request::new("GET", &server.url("/FUZZ"));
/// let mut input = InputMap::new();
/// input.insert(String::from("FUZZ"), b"admin".to_vec());
///
/// let mut request = client.prepare(&base, &input);
/// let response = client.execute(&mut request).await?;
///
/// mocked.assert_async().await;
/// assert_eq!(response.status_code(), 200);
/// assert_eq!(response.data(), b"welcome back");
/// assert_eq!(response.content_words(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct AsyncClient {
    client: HttpClient,
    routed: HttpClient,
    routes: Arc<Routes>,
    proxies: Arc<Proxies>,
    config: Config,
    first_request: Arc<AtomicBool>,
    force_debug: Arc<AtomicBool>,
}

impl AsyncClient {
    /// create a client for normal requests, using [`Config::proxy_url`]
    ///
    /// # Errors
    ///
    /// This method fails if the TLS backend cannot be initialized
    pub fn new(config: Config) -> Result<Self, FuffaError> {
        let transport = build_transport(&config, config.proxy_url.as_deref())?;

        Ok(Self::with_transport(transport, config))
    }

    /// create a client for replayed requests, using [`Config::replay_proxy_url`]
    ///
    /// # Errors
    ///
    /// see [`AsyncClient::new`]
    pub fn replay(config: Config) -> Result<Self, FuffaError> {
        let transport = build_transport(&config, config.replay_proxy_url.as_deref())?;

        Ok(Self::with_transport(transport, config))
    }

    fn with_transport(transport: Transport, config: Config) -> Self {
        let force_debug = Arc::new(AtomicBool::new(config.force_debug_next));

        Self {
            client: transport.direct,
            routed: transport.routed,
            routes: transport.routes,
            proxies: transport.proxies,
            config,
            first_request: Arc::new(AtomicBool::new(true)),
            force_debug,
        }
    }

    /// get the configuration this client was built with
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// print the next request/response pair to the console, regardless of
    /// [`Config::debug_first_request`]
    pub fn force_debug_next(&self) {
        atomic_store!(self.force_debug, true);
    }

    /// whether the current exchange should be printed; consumes the
    /// first-request and forced flags
    fn debug_due(&self) -> bool {
        let forced = self.force_debug.swap(false, Ordering::SeqCst);
        let first =
            self.config.debug_first_request && self.first_request.swap(false, Ordering::SeqCst);

        forced || first
    }

    /// pick the pool a request goes through, and the authority its uri carries
    ///
    /// over https, a `Host` header names the server (and with it the TLS server
    /// name) unless [`Config::sni`] overrides it; the connection is still dialed to
    /// the url's host
    fn route(&self, target: &RequestTarget, headers: &HeaderMap) -> (&HttpClient, String) {
        let direct = (&self.client, target.authority().to_string());

        if !target.is_secure() || self.config.sni.is_some() {
            return direct;
        }

        let Some(name) = headers
            .get(HOST)
            .and_then(|value| value.to_str().ok())
            .and_then(host_header_name)
        else {
            return direct;
        };

        let wire = format!("{name}:{}", target.port());
        let dial = format!("{}:{}", target.host(), target.port());

        if wire.eq_ignore_ascii_case(&dial) {
            return direct;
        }

        if self.routes.insert(&wire, &dial) {
            return (&self.routed, wire);
        }

        debug!(%wire, %dial, "host is already routed to another target; using the url's host as server name");

        direct
    }

    /// put one request on the wire and wait for the response head
    async fn send_once(
        &self,
        method: &Method,
        target: &RequestTarget,
        headers: &HeaderMap,
        data: Bytes,
    ) -> Result<Exchanged, FuffaError> {
        let (client, authority) = self.route(target, headers);

        let mut wire = http::Request::new(Full::new(data));
        *wire.method_mut() = method.clone();
        *wire.uri_mut() = target.uri(&authority)?;
        *wire.headers_mut() = headers.clone();

        if !target.is_secure() {
            let auth = self
                .proxies
                .for_target(false, target.host())
                .and_then(|proxy| proxy.auth());

            if let Some(auth) = auth {
                wire.headers_mut()
                    .entry(PROXY_AUTHORIZATION)
                    .or_insert_with(|| auth.clone());
            }
        }

        let response = client
            .request(wire)
            .await
            .map_err(|source| send_error(&source))?;

        let first_byte = response
            .extensions()
            .get::<ConnTimer>()
            .and_then(|timer| timer.0.first_byte());

        let (head, body) = response.into_parts();

        Ok(Exchanged {
            head,
            body,
            first_byte,
        })
    }

    /// send the request, following redirects when [`Config::follow_redirects`] is set
    async fn send(
        &self,
        mut method: Method,
        mut target: RequestTarget,
        mut headers: HeaderMap,
        data: &[u8],
    ) -> Result<Exchanged, FuffaError> {
        let mut data = Bytes::copy_from_slice(data);
        let mut redirects = 0;

        loop {
            let exchanged = self
                .send_once(&method, &target, &headers, data.clone())
                .await?;

            let status = exchanged.head.status;

            if !self.config.follow_redirects || !is_followed(status) {
                return Ok(exchanged);
            }

            let Some(location) = exchanged
                .head
                .headers
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .map(ToString::to_string)
            else {
                return Ok(exchanged);
            };

            if redirects == MAX_REDIRECTS {
                return Err(request_error(
                    RequestErrorKind::Redirect(Some(status.as_u16())),
                    &format!("stopped after {MAX_REDIRECTS} redirects"),
                ));
            }

            redirects += 1;

            let next = target.join(&location, self.config.raw)?;

            debug!(%location, %status, redirects, "following redirect");

            if matches!(
                status,
                StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::SEE_OTHER
            ) {
                if method != Method::HEAD {
                    method = Method::GET;
                }

                data = Bytes::new();
                headers.remove(CONTENT_TYPE);
                headers.remove(CONTENT_LENGTH);
            }

            // a Host override only survives relative redirects
            if Url::parse(&location).is_ok() {
                if let Ok(host) = HeaderValue::from_str(next.authority()) {
                    headers.insert(HOST, host);
                }
            }

            if !same_or_subdomain(next.host(), target.host()) {
                for sensitive in [AUTHORIZATION, WWW_AUTHENTICATE, COOKIE] {
                    headers.remove(sensitive);
                }
            }

            target = next;
        }
    }

    /// send the request and build the response; the body is downloaded and
    /// decoded unless the response is cancelled
    async fn exchange(&self, request: &mut Request) -> Result<Response, FuffaError> {
        let target = RequestTarget::parse(request.url(), self.config.raw)?;

        apply_defaults(request, &target);

        let method = parse_method(request)?;
        let headers = wire_headers(request)?;

        let capture = self.config.capture_raw();

        if capture {
            request.raw = dump_request(request, &target);
        }

        let dispatched = Instant::now();
        let dispatched_at = SystemTime::now();

        let Exchanged {
            head,
            body,
            first_byte,
        } = self
            .send(method, target.clone(), headers, request.data())
            .await?;

        // connections always report timing; the round trip is only a fallback
        let (sent_at, duration) =
            first_byte.unwrap_or_else(|| (dispatched_at, dispatched.elapsed()));

        request.timestamp = Some(sent_at);

        let mut response = Response::from_head(request.clone(), &head);
        response.duration = duration;
        response.timestamp = sent_at + duration;

        let show_debug = self.debug_due();

        if let Some(declared) = declared_length(&head.headers) {
            response.content_length = declared;

            if should_cancel(declared, self.config.ignore_body) {
                debug!(declared, url = request.url(), "leaving response body on the wire");

                // dropping the unread body closes its connection
                drop(body);

                response.cancelled = true;

                if show_debug {
                    debug::print(
                        &dump_request(request, &target),
                        &dump_response(head.version, head.status, &head.headers, None),
                    );
                }

                return Ok(response);
            }
        }

        let body = match body.collect().await {
            Ok(collected) => Some(collected.to_bytes().to_vec()),
            Err(source) => {
                warn!(%source, url = request.url(), "could not read response body; continuing without it");
                None
            }
        };

        let response_dump = if capture || show_debug {
            dump_response(head.version, head.status, &head.headers, body.as_deref())
        } else {
            String::new()
        };

        if let Some(raw_body) = body {
            let encoding = head
                .headers
                .get(CONTENT_ENCODING)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default();

            response.set_data(decode_body(encoding, raw_body).await);
        } else {
            // an unread body still counts as one empty word and line
            response.content_words = 1;
            response.content_lines = 1;
        }

        if show_debug {
            debug::print(&dump_request(request, &target), &response_dump);
        }

        if capture {
            response.raw = response_dump;
        }

        Ok(response)
    }

    /// [`AsyncClient::exchange`], bounded by [`Config::timeout`]
    async fn bounded_exchange(&self, request: &mut Request) -> Result<Response, FuffaError> {
        let Some(limit) = self.config.timeout_duration() else {
            return self.exchange(request).await;
        };

        tokio::time::timeout(limit, self.exchange(request))
            .await
            .unwrap_or_else(|_| {
                Err(request_error(
                    RequestErrorKind::Timeout,
                    &format!("no complete response within {limit:?}"),
                ))
            })
    }
}

/// statuses that are followed when following redirects
fn is_followed(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

/// whether `host` is `origin` or one of its subdomains
fn same_or_subdomain(host: &str, origin: &str) -> bool {
    host.eq_ignore_ascii_case(origin)
        || host
            .to_ascii_lowercase()
            .ends_with(&format!(".{}", origin.to_ascii_lowercase()))
}

/// the request's method, as it goes on the wire
fn parse_method(request: &Request) -> Result<Method, FuffaError> {
    Method::from_bytes(request.method().as_bytes()).map_err(|source| {
        error!(
            method = request.method(),
            %source,
            "could not parse the given http method"
        );

        FuffaError::MethodParseError {
            method: request.method().to_string(),
        }
    })
}

/// the request's headers, as they go on the wire; `Host` always carries
/// [`Request::host`]
fn wire_headers(request: &Request) -> Result<HeaderMap, FuffaError> {
    let mut headers = HeaderMap::with_capacity(request.headers().len() + 1);

    for (name, value) in request.headers() {
        if name.eq_ignore_ascii_case("host") {
            continue;
        }

        let invalid_header = || {
            error!(%name, %value, "header can't be put on the wire");

            FuffaError::InvalidHeader { name: name.clone() }
        };

        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid_header())?;
        let header_value = HeaderValue::from_str(value).map_err(|_| invalid_header())?;

        headers.insert(header_name, header_value);
    }

    let host = HeaderValue::from_str(request.host()).map_err(|_| {
        error!(host = request.host(), "host can't be put on the wire");

        FuffaError::InvalidHeader {
            name: String::from("Host"),
        }
    })?;

    headers.insert(HOST, host);

    Ok(headers)
}

#[async_trait]
impl Runner for AsyncClient {
    /// send a prepared [`Request`] and build its [`Response`]
    ///
    /// the whole exchange, body included, is bounded by [`Config::timeout`]; the
    /// call returns as soon as [`Config::cancel`] fires, dropping the in-flight
    /// exchange along with its connection
    ///
    /// # Errors
    ///
    /// This method fails if the request can't be built (method, url, or headers),
    /// if there was an error while sending the request, or if the run was cancelled.
    #[instrument(skip_all, level = "trace")]
    async fn execute(&self, request: &mut Request) -> Result<Response, FuffaError> {
        tokio::select! {
            biased;

            () = self.config.cancel.cancelled() => {
                debug!("request abandoned; run was cancelled");
                Err(FuffaError::Cancelled)
            }
            result = self.bounded_exchange(request) => result,
        }
    }

    /// render the request as [`AsyncClient::execute`] would send it
    ///
    /// # Errors
    ///
    /// This method fails if the request's url can't be parsed
    #[instrument(skip_all, level = "trace")]
    async fn dump(&self, request: &mut Request) -> Result<Vec<u8>, FuffaError> {
        let target = RequestTarget::parse(request.url(), self.config.raw)?;

        apply_defaults(request, &target);

        Ok(dump_request(request, &target).into_bytes())
    }
}

//! connection establishment: proxies, tunnels, TLS, per-host limits, and io timing
use super::proxy::Proxies;
use super::timing::{ConnTimer, IoTimer, TimedStream};

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use http::{HeaderValue, Uri};
use hyper::rt::{Read, ReadBufCursor, Write};
use hyper_util::client::legacy::connect::{Connected, Connection};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_native_tls::TlsStream;
use tower_service::Service;
use tracing::{debug, instrument, trace};

/// simultaneous connections allowed to a single host
pub(super) const MAX_CONNS_PER_HOST: usize = 500;

/// upper bound on a proxy's answer to `CONNECT`
const MAX_TUNNEL_RESPONSE: usize = 8192;

/// plain or TLS-wrapped tcp connection
#[derive(Debug)]
pub(super) enum MaybeTls {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for MaybeTls {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MaybeTls {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write_vectored(cx, bufs),
            Self::Tls(stream) => Pin::new(stream).poll_write_vectored(cx, bufs),
        }
    }

    fn is_write_vectored(&self) -> bool {
        match self {
            Self::Plain(stream) => stream.is_write_vectored(),
            Self::Tls(stream) => stream.is_write_vectored(),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// an established connection, as handed to the connection pool
///
/// holds one of its host's connection permits until dropped
#[derive(Debug)]
pub(super) struct Conn {
    io: TokioIo<TimedStream<MaybeTls>>,
    timer: Arc<IoTimer>,
    proxied: bool,
    h2: bool,
    _permit: OwnedSemaphorePermit,
}

impl Read for Conn {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().io).poll_read(cx, buf)
    }
}

impl Write for Conn {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().io).poll_write(cx, buf)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().io).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.io.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().io).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().io).poll_shutdown(cx)
    }
}

impl Connection for Conn {
    fn connected(&self) -> Connected {
        let connected = Connected::new()
            .proxy(self.proxied)
            .extra(ConnTimer(Arc::clone(&self.timer)));

        if self.h2 {
            connected.negotiated_h2()
        } else {
            connected
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// wire authorities whose connections must be dialed somewhere else
///
/// a request carrying a `Host` header is addressed to that host (which then
/// becomes the TLS server name), while its connection still goes to the url's
/// authority
#[derive(Debug, Default)]
pub(super) struct Routes {
    overrides: Mutex<HashMap<String, String>>,
}

impl Routes {
    /// send connections for `wire` to `dial`
    ///
    /// the first route registered for `wire` sticks; `false` means `wire` already
    /// leads to a different authority
    pub(super) fn insert(&self, wire: &str, dial: &str) -> bool {
        match lock(&self.overrides).entry(wire.to_string()) {
            Entry::Occupied(existing) => existing.get() == dial,
            Entry::Vacant(vacant) => {
                vacant.insert(dial.to_string());
                true
            }
        }
    }

    /// where connections for `wire` should be dialed
    fn resolve(&self, wire: &str) -> Option<String> {
        lock(&self.overrides).get(wire).cloned()
    }
}

/// settings shared by every clone of a [`Connector`]
pub(super) struct ConnectorSettings {
    pub(super) tls: tokio_native_tls::TlsConnector,
    pub(super) proxies: Arc<Proxies>,
    pub(super) sni: Option<String>,
    pub(super) timeout: Option<Duration>,
    pub(super) limits: Arc<HostLimits>,
}

impl fmt::Debug for ConnectorSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorSettings")
            .field("proxies", &self.proxies)
            .field("sni", &self.sni)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// caps the number of simultaneous connections to each host
#[derive(Debug, Default)]
pub(super) struct HostLimits {
    per_host: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl HostLimits {
    fn for_host(&self, authority: &str) -> Arc<Semaphore> {
        let mut per_host = lock(&self.per_host);

        Arc::clone(
            per_host
                .entry(authority.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(MAX_CONNS_PER_HOST))),
        )
    }
}

/// the [`Service`] the connection pool dials through
///
/// a connector either dials the uri's own authority, or, when it carries
/// [`Routes`], the authority registered for it
#[derive(Clone, Debug)]
pub(super) struct Connector {
    settings: Arc<ConnectorSettings>,
    routes: Option<Arc<Routes>>,
}

impl Connector {
    pub(super) const fn new(settings: Arc<ConnectorSettings>, routes: Option<Arc<Routes>>) -> Self {
        Self { settings, routes }
    }

    /// establish a connection for `uri`, within the configured timeout
    #[instrument(skip(self), level = "trace")]
    async fn connect(self, uri: Uri) -> io::Result<Conn> {
        let secure = match uri.scheme_str() {
            Some("https") => true,
            Some("http") => false,
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("unsupported scheme {other:?}"),
                ))
            }
        };

        let host = uri
            .host()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "uri has no host"))?;
        let port = uri.port_u16().unwrap_or(if secure { 443 } else { 80 });
        let wire = format!("{host}:{port}");

        let dial = self
            .routes
            .as_ref()
            .and_then(|routes| routes.resolve(&wire))
            .unwrap_or_else(|| wire.clone());

        let server_name = self
            .settings
            .sni
            .clone()
            .unwrap_or_else(|| host.trim_start_matches('[').trim_end_matches(']').to_string());

        let permit = self
            .settings
            .limits
            .for_host(&dial)
            .acquire_owned()
            .await
            .map_err(io::Error::other)?;

        let establish = self.establish(secure, &dial, &server_name, permit);

        match self.settings.timeout {
            Some(timeout) => tokio::time::timeout(timeout, establish)
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, format!("connecting to {dial} timed out")))?,
            None => establish.await,
        }
    }

    /// dial `dial` (possibly through a proxy) and run the TLS handshake when `secure`
    async fn establish(
        &self,
        secure: bool,
        dial: &str,
        server_name: &str,
        permit: OwnedSemaphorePermit,
    ) -> io::Result<Conn> {
        let dial_host = dial.rsplit_once(':').map_or(dial, |(host, _)| host);
        let proxy = self.settings.proxies.for_target(secure, dial_host);

        let stream = match proxy {
            Some(proxy) => {
                trace!(proxy = proxy.authority(), dial, "connecting through proxy");

                let mut stream = TcpStream::connect(proxy.authority()).await?;

                if secure {
                    tunnel(&mut stream, dial, proxy.auth()).await?;
                }

                stream
            }
            None => TcpStream::connect(dial).await?,
        };

        stream.set_nodelay(true)?;

        let (io, h2) = if secure {
            let tls = self
                .settings
                .tls
                .connect(server_name, stream)
                .await
                .map_err(io::Error::other)?;

            let h2 = matches!(tls.get_ref().negotiated_alpn(), Ok(Some(protocol)) if protocol == b"h2");

            (MaybeTls::Tls(Box::new(tls)), h2)
        } else {
            (MaybeTls::Plain(stream), false)
        };

        debug!(dial, server_name, h2, "connection established");

        let timer = Arc::new(IoTimer::default());

        Ok(Conn {
            io: TokioIo::new(TimedStream::new(io, Arc::clone(&timer))),
            timer,
            proxied: proxy.is_some() && !secure,
            h2,
            _permit: permit,
        })
    }
}

impl Service<Uri> for Connector {
    type Response = Conn;
    type Error = io::Error;
    type Future = Pin<Box<dyn Future<Output = io::Result<Conn>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        Box::pin(self.clone().connect(uri))
    }
}

/// ask the proxy on the other end of `stream` to open a tunnel to `target`
async fn tunnel(stream: &mut TcpStream, target: &str, auth: Option<&HeaderValue>) -> io::Result<()> {
    let mut request = format!("CONNECT {target} HTTP/1.1\r\nHost: {target}\r\n").into_bytes();

    if let Some(auth) = auth {
        request.extend_from_slice(b"Proxy-Authorization: ");
        request.extend_from_slice(auth.as_bytes());
        request.extend_from_slice(b"\r\n");
    }

    request.extend_from_slice(b"\r\n");
    stream.write_all(&request).await?;

    // read byte by byte; anything past the blank line belongs to the tunnel
    let mut response = Vec::with_capacity(128);

    while !response.ends_with(b"\r\n\r\n") {
        if response.len() >= MAX_TUNNEL_RESPONSE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "proxy response to CONNECT is too large",
            ));
        }

        let byte = stream.read_u8().await?;
        response.push(byte);
    }

    let status = response.split(|byte| *byte == b' ').nth(1).unwrap_or_default();

    if status.starts_with(b"2") {
        return Ok(());
    }

    let status_line = response
        .split(|byte| *byte == b'\r')
        .next()
        .unwrap_or_default();

    Err(io::Error::new(
        io::ErrorKind::ConnectionRefused,
        format!(
            "proxy refused to tunnel to {target}: {}",
            String::from_utf8_lossy(status_line)
        ),
    ))
}

//! per-connection io timestamps, used to measure first-byte latency
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::{Duration, Instant, SystemTime};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

#[derive(Debug, Default)]
struct Marks {
    /// last successful write of the current exchange, as a monotonic and a wall-clock instant
    written: Option<(Instant, SystemTime)>,

    /// first successful read after `written`
    first_byte: Option<Instant>,
}

/// records when a request was last written to a connection and when the
/// first byte of the answer came back
///
/// a write that follows a completed read starts a new exchange, so the marks
/// always describe the most recent request on the connection
#[derive(Debug, Default)]
pub(super) struct IoTimer {
    marks: Mutex<Marks>,
}

impl IoTimer {
    fn lock(&self) -> MutexGuard<'_, Marks> {
        self.marks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wrote(&self) {
        let mut marks = self.lock();

        marks.written = Some((Instant::now(), SystemTime::now()));
        marks.first_byte = None;
    }

    fn read(&self) {
        let mut marks = self.lock();

        if marks.written.is_some() && marks.first_byte.is_none() {
            marks.first_byte = Some(Instant::now());
        }
    }

    /// the wall-clock time the request finished writing and the latency until
    /// the first response byte, once both have been observed
    pub(super) fn first_byte(&self) -> Option<(SystemTime, Duration)> {
        let marks = self.lock();

        let (written_at, wall_clock) = marks.written?;
        let first_byte = marks.first_byte?;

        Some((wall_clock, first_byte.saturating_duration_since(written_at)))
    }
}

/// handle to a connection's [`IoTimer`], handed to responses through the
/// connection's metadata
#[derive(Clone, Debug)]
pub(super) struct ConnTimer(pub(super) Arc<IoTimer>);

/// io wrapper that feeds an [`IoTimer`]
#[derive(Debug)]
pub(super) struct TimedStream<S> {
    inner: S,
    timer: Arc<IoTimer>,
}

impl<S> TimedStream<S> {
    pub(super) fn new(inner: S, timer: Arc<IoTimer>) -> Self {
        Self { inner, timer }
    }
}

impl<S> AsyncRead for TimedStream<S>
where
    S: AsyncRead + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();

        let polled = Pin::new(&mut this.inner).poll_read(cx, buf);

        if matches!(polled, Poll::Ready(Ok(()))) && buf.filled().len() > before {
            this.timer.read();
        }

        polled
    }
}

impl<S> AsyncWrite for TimedStream<S>
where
    S: AsyncWrite + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_write(cx, buf);

        if matches!(polled, Poll::Ready(Ok(written)) if written > 0) {
            this.timer.wrote();
        }

        polled
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_write_vectored(cx, bufs);

        if matches!(polled, Poll::Ready(Ok(written)) if written > 0) {
            this.timer.wrote();
        }

        polled
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn latency_runs_from_last_write_to_first_read() {
        let (client, mut server) = tokio::io::duplex(64);
        let timer = Arc::new(IoTimer::default());
        let mut stream = TimedStream::new(client, Arc::clone(&timer));

        assert!(timer.first_byte().is_none());

        stream.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
        assert!(timer.first_byte().is_none());

        let mut request = [0; 18];
        server.read_exact(&mut request).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        server.write_all(b"HTTP/1.1 200 OK\r\n").await.unwrap();

        let mut response = [0; 17];
        stream.read_exact(&mut response).await.unwrap();

        let (_, latency) = timer.first_byte().unwrap();
        assert!(latency >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn slow_writes_are_not_counted_as_latency() {
        let (client, mut server) = tokio::io::duplex(64);
        let timer = Arc::new(IoTimer::default());
        let mut stream = TimedStream::new(client, Arc::clone(&timer));

        let reader = tokio::spawn(async move {
            // the duplex buffer is smaller than the upload, so the writer stalls here
            tokio::time::sleep(Duration::from_millis(300)).await;

            let mut upload = vec![0; 1024];
            server.read_exact(&mut upload).await.unwrap();
            server.write_all(b"HTTP/1.1 200 OK\r\n").await.unwrap();
            server
        });

        stream.write_all(&[b'a'; 1024]).await.unwrap();

        let mut response = [0; 17];
        stream.read_exact(&mut response).await.unwrap();
        reader.await.unwrap();

        let (_, latency) = timer.first_byte().unwrap();
        assert!(latency < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn each_exchange_on_a_connection_is_timed_separately() {
        let (client, mut server) = tokio::io::duplex(64);
        let timer = Arc::new(IoTimer::default());
        let mut stream = TimedStream::new(client, Arc::clone(&timer));
        let mut buffer = [0; 4];

        stream.write_all(b"ping").await.unwrap();
        server.read_exact(&mut buffer).await.unwrap();
        server.write_all(b"pong").await.unwrap();
        stream.read_exact(&mut buffer).await.unwrap();

        let (first_sent, _) = timer.first_byte().unwrap();

        stream.write_all(b"ping").await.unwrap();
        assert!(timer.first_byte().is_none());

        server.read_exact(&mut buffer).await.unwrap();
        server.write_all(b"pong").await.unwrap();
        stream.read_exact(&mut buffer).await.unwrap();

        let (second_sent, _) = timer.first_byte().unwrap();
        assert!(second_sent >= first_sent);
    }
}

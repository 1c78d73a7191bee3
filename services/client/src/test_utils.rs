//! In-memory connectors and streams for unit tests

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::transport::Connector;

/// Hands out pre-built streams, one per `connect` call.
///
/// Once the script runs out, further dials fail with `ConnectionRefused`
/// (or hang forever for a `pending()` connector).
pub struct ScriptedConnector<S> {
    streams: Mutex<VecDeque<S>>,
    connects: Arc<AtomicUsize>,
    hang: bool,
}

impl<S> ScriptedConnector<S> {
    pub fn new(streams: Vec<S>) -> Self {
        Self {
            streams: Mutex::new(streams.into()),
            connects: Arc::new(AtomicUsize::new(0)),
            hang: false,
        }
    }

    /// Connector whose dial never completes
    pub fn pending() -> Self {
        Self {
            hang: true,
            ..Self::new(Vec::new())
        }
    }

    /// Shared counter of dial attempts
    pub fn connects(&self) -> Arc<AtomicUsize> {
        self.connects.clone()
    }
}

#[async_trait]
impl<S> Connector for ScriptedConnector<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    type Stream = S;

    async fn connect(&self) -> io::Result<S> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        let next = self.streams.lock().unwrap().pop_front();
        next.ok_or_else(|| io::Error::new(io::ErrorKind::ConnectionRefused, "script exhausted"))
    }

    fn address(&self) -> &str {
        "scripted:0"
    }
}

/// Stream that accepts at most `capacity` bytes, then reports zero-length writes
pub struct ShortWriteStream {
    capacity: usize,
    written: Arc<Mutex<Vec<u8>>>,
    to_read: VecDeque<u8>,
}

impl ShortWriteStream {
    pub fn new(capacity: usize, to_read: &[u8]) -> Self {
        Self {
            capacity,
            written: Arc::new(Mutex::new(Vec::new())),
            to_read: to_read.iter().copied().collect(),
        }
    }

    /// Everything the stream accepted so far
    pub fn written(&self) -> Arc<Mutex<Vec<u8>>> {
        self.written.clone()
    }
}

impl AsyncWrite for ShortWriteStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let mut written = this.written.lock().unwrap();
        let room = this.capacity.saturating_sub(written.len());
        let n = room.min(buf.len());
        written.extend_from_slice(&buf[..n]);
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

impl AsyncRead for ShortWriteStream {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let n = this.to_read.len().min(buf.remaining());
        let chunk: Vec<u8> = this.to_read.drain(..n).collect();
        buf.put_slice(&chunk);
        Poll::Ready(Ok(()))
    }
}

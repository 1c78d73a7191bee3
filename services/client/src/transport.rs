//! Transport session
//!
//! One connection at a time, used half-duplex: every request frame is followed
//! by exactly one response line. The session never reconnects on its own; a
//! failed send or receive drops the stream and leaves the session
//! `Disconnected` until the caller asks for a new connection.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::codec::{read_response, Frame};
use crate::errors::{ClientError, Result};

/// Opens byte streams to the aggregator
#[async_trait]
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    async fn connect(&self) -> io::Result<Self::Stream>;

    /// Human-readable peer address, for logs and errors
    fn address(&self) -> &str;
}

/// Plain TCP connector
pub struct TcpConnector {
    address: String,
}

impl TcpConnector {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(&self.address).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    fn address(&self) -> &str {
        &self.address
    }
}

pub enum SessionState<S> {
    Disconnected,
    Connected(BufReader<S>),
}

pub struct Session<C: Connector> {
    connector: C,
    connect_timeout: Duration,
    cancel: CancellationToken,
    state: SessionState<C::Stream>,
}

impl<C: Connector> Session<C> {
    pub fn new(connector: C, connect_timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            connector,
            connect_timeout,
            cancel,
            state: SessionState::Disconnected,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Connected(_))
    }

    pub fn address(&self) -> &str {
        self.connector.address()
    }

    /// Dial the aggregator, replacing any current connection.
    ///
    /// The dial is bounded by the connect timeout and abandoned on cancellation.
    pub async fn connect(&mut self) -> Result<()> {
        self.close().await;

        let address = self.connector.address().to_string();
        let dial = tokio::time::timeout(self.connect_timeout, self.connector.connect());

        let stream = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(ClientError::Cancelled),
            dialed = dial => match dialed {
                Ok(Ok(stream)) => stream,
                Ok(Err(source)) => {
                    error!(action = "connect", result = "fail", address = %address, error = %source);
                    return Err(ClientError::Connect { address, source });
                }
                Err(_) => {
                    error!(action = "connect", result = "fail", address = %address, "Dial timed out");
                    return Err(ClientError::ConnectTimeout {
                        address,
                        timeout: self.connect_timeout,
                    });
                }
            },
        };

        debug!(action = "connect", result = "success", address = %address);
        self.state = SessionState::Connected(BufReader::new(stream));
        Ok(())
    }

    /// Write every byte of the frame and flush.
    ///
    /// One logical write means writing until the whole frame is accepted, then
    /// flushing. A partial write is continued from where it stopped; a write
    /// that accepts zero bytes before the frame is complete fails the send with
    /// `ShortWrite` and is not retried. The connection is dropped on any failure.
    pub async fn send(&mut self, frame: &Frame) -> Result<()> {
        let stream = match &mut self.state {
            SessionState::Connected(stream) => stream,
            SessionState::Disconnected => return Err(ClientError::NotConnected),
        };

        let result = write_frame(stream, frame.as_bytes()).await;
        if let Err(e) = &result {
            error!(action = "send_message", result = "fail", error = %e);
            self.state = SessionState::Disconnected;
        }
        result
    }

    /// Read one response line; cancellation interrupts the wait.
    ///
    /// A line that is already available is returned even after cancellation.
    pub async fn receive_line(&mut self) -> Result<String> {
        let stream = match &mut self.state {
            SessionState::Connected(stream) => stream,
            SessionState::Disconnected => return Err(ClientError::NotConnected),
        };

        let received = tokio::select! {
            biased;
            line = read_response(stream) => line.map_err(ClientError::Receive),
            _ = self.cancel.cancelled() => Err(ClientError::Cancelled),
        };

        if let Err(e) = &received {
            if !matches!(e, ClientError::Cancelled) {
                error!(action = "receive_message", result = "fail", error = %e);
            }
            self.state = SessionState::Disconnected;
        }
        received
    }

    /// Send a frame and wait for its single response line
    pub async fn request(&mut self, frame: &Frame) -> Result<String> {
        self.send(frame).await?;
        self.receive_line().await
    }

    /// Shut the stream down; a no-op when already disconnected
    pub async fn close(&mut self) {
        if let SessionState::Connected(mut stream) =
            std::mem::replace(&mut self.state, SessionState::Disconnected)
        {
            if let Err(e) = stream.shutdown().await {
                debug!(error = %e, "Error while shutting down connection");
            }
        }
    }
}

async fn write_frame<W>(stream: &mut W, bytes: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0;
    while written < bytes.len() {
        match stream.write(&bytes[written..]).await {
            Ok(0) => {
                return Err(ClientError::ShortWrite {
                    written,
                    expected: bytes.len(),
                })
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ClientError::Send(e)),
        }
    }
    stream.flush().await.map_err(ClientError::Send)
}

//! WebSocket transport
//!
//! `Connector` and `Transport` are the seam between the connection lifecycle
//! and the socket. The production implementation wraps tokio-tungstenite:
//! - Nagle disabled on the TCP stream
//! - Connect timeout
//! - Inbound pings answered by tungstenite on the next read/write
//! - After a receive error the connection reports closed on the next read

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async_with_config,
    tungstenite::protocol::Message,
    MaybeTlsStream, WebSocketStream,
};

/// Errors that can occur on the transport
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Send failed: {0}")]
    SendFailed(String),
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),
    #[error("Timeout")]
    Timeout,
    #[error("Not connected")]
    NotConnected,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, TransportError>;

/// Inbound frame surfaced to the lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// JSON text frame
    Text(String),
    /// Answer to a keep-alive probe
    Pong,
}

/// An open, bidirectional stream connection
pub trait Transport: Send + 'static {
    /// Next inbound frame. `None` once the connection is closed.
    fn recv(&mut self) -> impl Future<Output = Option<Result<Frame>>> + Send;

    /// Send a keep-alive probe
    fn ping(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Close gracefully
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Opens transports for a URL
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport;

    fn connect(&self, url: &str) -> impl Future<Output = Result<Self::Transport>> + Send;
}

/// Connector producing tokio-tungstenite connections
#[derive(Debug, Clone)]
pub struct TungsteniteConnector {
    connect_timeout: Duration,
}

impl TungsteniteConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TungsteniteConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl Connector for TungsteniteConnector {
    type Transport = WebSocketConnection;

    async fn connect(&self, url: &str) -> Result<WebSocketConnection> {
        WebSocketConnection::connect(url, self.connect_timeout).await
    }
}

/// Connection state as seen by the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SocketState {
    Connected,
    Disconnected,
}

/// tokio-tungstenite connection
pub struct WebSocketConnection {
    /// Underlying WebSocket stream
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    state: SocketState,
}

impl WebSocketConnection {
    /// Connect to a WebSocket endpoint
    ///
    /// # Arguments
    /// * `url` - WebSocket URL (wss:// or ws://)
    /// * `connect_timeout` - upper bound for TCP + TLS + handshake
    pub async fn connect(url: &str, connect_timeout: Duration) -> Result<Self> {
        // disable_nagle = true
        let connect_future = connect_async_with_config(url, None, true);
        let (ws_stream, _) = timeout(connect_timeout, connect_future)
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            stream: ws_stream,
            state: SocketState::Connected,
        })
    }

    async fn send(&mut self, msg: Message) -> Result<()> {
        if self.state != SocketState::Connected {
            return Err(TransportError::NotConnected);
        }

        self.stream
            .send(msg)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }
}

impl Transport for WebSocketConnection {
    async fn recv(&mut self) -> Option<Result<Frame>> {
        loop {
            if self.state != SocketState::Connected {
                return None;
            }

            match self.stream.next().await {
                Some(Ok(msg)) => {
                    match msg {
                        Message::Text(text) => return Some(Ok(Frame::Text(text.as_str().to_owned()))),
                        Message::Binary(data) => match std::str::from_utf8(&data) {
                            Ok(text) => return Some(Ok(Frame::Text(text.to_owned()))),
                            Err(e) => return Some(Err(TransportError::ReceiveFailed(e.to_string()))),
                        },
                        Message::Pong(_) => return Some(Ok(Frame::Pong)),
                        // tungstenite queues the pong itself
                        Message::Ping(_) | Message::Frame(_) => continue,
                        Message::Close(_) => {
                            self.state = SocketState::Disconnected;
                            return None;
                        }
                    }
                }
                Some(Err(e)) => {
                    self.state = SocketState::Disconnected;
                    return Some(Err(TransportError::ReceiveFailed(e.to_string())));
                }
                None => {
                    self.state = SocketState::Disconnected;
                    return None;
                }
            }
        }
    }

    async fn ping(&mut self) -> Result<()> {
        self.send(Message::Ping(Bytes::new())).await
    }

    async fn close(&mut self) -> Result<()> {
        if self.state == SocketState::Connected {
            self.state = SocketState::Disconnected;
            self.stream
                .close(None)
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        }
        Ok(())
    }
}

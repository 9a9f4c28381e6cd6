//! WebSocket transport abstraction.
//!
//! The connection manager speaks STOMP over whatever implements
//! [`SocketTransport`]; production uses [`WsTransport`] (tokio-tungstenite),
//! tests plug in an in-memory socket.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    #[error("broker error: {0}")]
    Protocol(String),
    #[error("no heart-beat from broker within {0:?}")]
    HeartbeatTimeout(Duration),
    #[error("connection closed: {0}")]
    Closed(String),
}

impl TransportError {
    pub fn connection<E: std::fmt::Display>(err: E) -> Self {
        TransportError::Connection(err.to_string())
    }
}

/// Opens socket connections.
#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn SocketConnection>, TransportError>;
}

/// One open, text-oriented socket.
#[async_trait]
pub trait SocketConnection: Send {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Next text message; `None` once the peer has closed the socket.
    async fn recv_text(&mut self) -> Option<Result<String, TransportError>>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

#[derive(Debug, Clone)]
pub struct WsTransport {
    connect_timeout: Duration,
}

impl WsTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl SocketTransport for WsTransport {
    async fn connect(&self, url: &str) -> Result<Box<dyn SocketConnection>, TransportError> {
        debug!("opening websocket to {}", redact_token(url));
        let (stream, response) =
            tokio::time::timeout(self.connect_timeout, tokio_tungstenite::connect_async(url))
                .await
                .map_err(|_| TransportError::Timeout(self.connect_timeout))?
                .map_err(TransportError::connection)?;
        info!(
            "websocket open (status {})",
            response.status().as_u16()
        );
        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl SocketConnection for WsConnection {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        trace!("ws -> {} bytes", text.len());
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(TransportError::connection)
    }

    async fn recv_text(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(TransportError::connection(e))),
            };
            match message {
                Message::Text(text) => return Some(Ok(text)),
                Message::Binary(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => return Some(Ok(text)),
                    Err(e) => {
                        return Some(Err(TransportError::Protocol(format!(
                            "non-utf8 binary frame: {e}"
                        ))))
                    }
                },
                Message::Close(frame) => {
                    let reason = frame
                        .map(|f| format!("{} {}", u16::from(f.code), f.reason))
                        .unwrap_or_else(|| "no close frame".to_string());
                    return Some(Err(TransportError::Closed(reason)));
                }
                // Ping/pong are answered by tungstenite itself.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.stream
            .close(None)
            .await
            .map_err(TransportError::connection)
    }
}

/// Mask the `token` query parameter before logging a URL.
pub fn redact_token(url: &str) -> String {
    match url.split_once("token=") {
        Some((head, tail)) => {
            let rest = tail.find('&').map(|idx| &tail[idx..]).unwrap_or("");
            format!("{head}token=<redacted>{rest}")
        }
        None => url.to_string(),
    }
}

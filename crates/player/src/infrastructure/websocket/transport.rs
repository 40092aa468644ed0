//! Transport seam between the session task and the socket implementation.

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to connect: {0}")]
    Connect(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Connection closed")]
    Closed,
}

/// One open, message-oriented, full-duplex connection.
#[async_trait]
pub trait Transport: Send {
    /// Write one text frame.
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Next inbound text frame. `None` once the peer has closed.
    ///
    /// Must be cancel safe: the session task polls it inside `select!`.
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    /// Close the connection. Errors are swallowed; the handle is dropped next.
    async fn close(&mut self);
}

/// Opens transports. Shared by every reconnect attempt of a session.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Transport>, TransportError>;
}

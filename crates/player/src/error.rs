//! Session error types

use idlemmo_shared::CodecError;
use thiserror::Error;

use crate::infrastructure::websocket::TransportError;

/// Errors surfaced to callers of the session API.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Connect was requested without a usable token
    #[error("Session token is missing")]
    MissingToken,

    /// Connect with a token other than the one the open connection uses
    #[error("Session is already connected with a different token")]
    AlreadyConnected,

    #[error("Invalid gateway URL '{url}': {reason}")]
    InvalidGatewayUrl { url: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The session task is gone; every handle method returns this afterwards
    #[error("Session task has shut down")]
    SessionClosed,
}

impl SessionError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// What happened to an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Written to the live transport
    Sent,
    /// Discarded because the connection was not live
    Dropped,
}

impl SendOutcome {
    pub fn is_sent(self) -> bool {
        self == SendOutcome::Sent
    }
}

//! IdleMMO player session runtime.
//!
//! Keeps a WebSocket session to the game gateway alive (login handshake,
//! heartbeat, reconnection) and mirrors the player's authoritative state
//! locally by reducing inbound messages.
//!
//! [`GameSession`] is the entry point. Everything else is reachable for
//! callers that want to assemble the pieces themselves.

pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logging;
pub mod session;
pub mod state;

pub use config::SessionConfig;
pub use error::{SendOutcome, SessionError};
pub use infrastructure::messaging::{
    ConnectionState, ConnectionStateObserver, MessageDispatcher, SubscriptionId,
};
pub use infrastructure::websocket::{
    Connector, SessionClient, Transport, TransportError, TungsteniteConnector,
};
pub use session::GameSession;
pub use state::{GameState, GameStore};

#[cfg(any(test, feature = "testing"))]
pub use infrastructure::testing;

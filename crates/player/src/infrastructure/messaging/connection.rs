//! Connection lifecycle state.
//!
//! The session task owns the authoritative state; everyone else reads it
//! through a [`ConnectionStateObserver`] backed by one shared atomic.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Lifecycle state of the gateway connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No transport and nothing scheduled
    #[default]
    Disconnected,
    /// Transport handshake in flight
    Connecting,
    /// Transport open, `C_Login` sent, waiting for confirmation
    Authenticating,
    /// Logged in; heartbeat running
    Live,
    /// Transport lost; a retry is scheduled
    Reconnecting,
}

impl ConnectionState {
    /// Convert to u8 for atomic storage.
    pub fn to_u8(self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Authenticating => 2,
            ConnectionState::Live => 3,
            ConnectionState::Reconnecting => 4,
        }
    }

    /// Convert from u8 (atomic storage).
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Authenticating,
            3 => ConnectionState::Live,
            4 => ConnectionState::Reconnecting,
            _ => ConnectionState::Disconnected,
        }
    }

    /// True while a transport is open or being opened.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Authenticating | ConnectionState::Live
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Authenticating => "authenticating",
            ConnectionState::Live => "live",
            ConnectionState::Reconnecting => "reconnecting",
        };
        f.write_str(name)
    }
}

/// Observable connection state for UI binding.
///
/// Cheap to clone; every clone reads the same underlying state.
#[derive(Clone, Debug)]
pub struct ConnectionStateObserver {
    state: Arc<AtomicU8>,
}

impl ConnectionStateObserver {
    /// Create a new observer from a shared state Arc.
    pub fn new(state: Arc<AtomicU8>) -> Self {
        Self { state }
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_live(&self) -> bool {
        self.state() == ConnectionState::Live
    }
}

/// Internal helper to update connection state (used by the session task).
pub fn set_connection_state(state_ref: &AtomicU8, new_state: ConnectionState) {
    state_ref.store(new_state.to_u8(), Ordering::SeqCst);
}

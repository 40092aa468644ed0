//! Platform-agnostic core of the gateway connection.
//!
//! This is free of any runtime dependencies (no tokio, no sockets, no timers).
//! The session task feeds it events and executes the [`CoreAction`]s it
//! returns, in order. Keeping the transitions here means every lifecycle rule
//! can be tested without a runtime.
//!
//! Every transport open is tagged with an attempt id. Events carrying an id
//! other than the current one come from a superseded transport and are
//! ignored.

use std::time::Duration;

use idlemmo_shared::{message_types, ClientMessage, Envelope};

use crate::error::{SendOutcome, SessionError};
use crate::infrastructure::messaging::ConnectionState;

use super::heartbeat::{HeartbeatMonitor, HeartbeatTick};

/// Side effects requested by the core.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreAction {
    StateChanged(ConnectionState),
    /// Open a transport authenticated with `token`
    OpenTransport { attempt: u64, token: String },
    /// Close the current transport and abandon any open in flight
    CloseTransport,
    /// Write one envelope to the current transport
    Write(Envelope),
    /// Hand an inbound envelope to the dispatcher
    Publish(Envelope),
    /// Start a fresh heartbeat timer, first tick one full period from now
    StartHeartbeat,
    StopHeartbeat,
    /// Arm the reconnect timer
    ScheduleRetry,
    CancelRetry,
}

/// Connection lifecycle state machine.
#[derive(Debug)]
pub struct SessionCore {
    state: ConnectionState,
    token: Option<String>,
    attempt: u64,
    heartbeat: HeartbeatMonitor,
    confirm_on_first_message: bool,
}

impl SessionCore {
    pub fn new(heartbeat: HeartbeatMonitor, confirm_on_first_message: bool) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            token: None,
            attempt: 0,
            heartbeat,
            confirm_on_first_message,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Id of the most recent open attempt.
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    pub fn is_current(&self, attempt: u64) -> bool {
        attempt == self.attempt
    }

    /// Token used for the current connection and every retry of it.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Heartbeat period while live.
    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat.interval()
    }

    /// Explicit connect request.
    ///
    /// Rejected when the token is blank, or when a transport is open or
    /// opening for a different token. A no-op while a transport is open or
    /// opening for the same token. While a retry is pending the retry is
    /// cancelled and the connection opens immediately.
    pub fn connect(&mut self, token: &str) -> Result<Vec<CoreAction>, SessionError> {
        if token.trim().is_empty() {
            return Err(SessionError::MissingToken);
        }

        match self.state {
            ConnectionState::Connecting
            | ConnectionState::Authenticating
            | ConnectionState::Live => {
                if self.token() != Some(token) {
                    tracing::warn!(state = %self.state, "Connect with a different token rejected");
                    return Err(SessionError::AlreadyConnected);
                }
                Ok(Vec::new())
            }
            ConnectionState::Reconnecting => {
                let mut actions = vec![CoreAction::CancelRetry];
                actions.extend(self.begin_attempt(token.to_string()));
                Ok(actions)
            }
            ConnectionState::Disconnected => Ok(self.begin_attempt(token.to_string())),
        }
    }

    /// Explicit disconnect. Always succeeds; cancels everything in flight.
    pub fn disconnect(&mut self) -> Vec<CoreAction> {
        self.token = None;
        self.heartbeat.reset();
        // Invalidate any open still in flight.
        self.attempt += 1;

        let mut actions = vec![
            CoreAction::CancelRetry,
            CoreAction::StopHeartbeat,
            CoreAction::CloseTransport,
        ];
        if self.state != ConnectionState::Disconnected {
            self.state = ConnectionState::Disconnected;
            actions.push(CoreAction::StateChanged(ConnectionState::Disconnected));
        }
        actions
    }

    /// The transport for `attempt` finished its handshake.
    pub fn on_transport_opened(&mut self, attempt: u64) -> Vec<CoreAction> {
        if !self.is_current(attempt) || self.state != ConnectionState::Connecting {
            return Vec::new();
        }
        let Some(token) = self.token.clone() else {
            return self.disconnect();
        };

        self.state = ConnectionState::Authenticating;
        let mut actions = vec![CoreAction::StateChanged(ConnectionState::Authenticating)];
        match ClientMessage::login(token).to_envelope() {
            Ok(login) => actions.push(CoreAction::Write(login)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode login message");
                actions.extend(self.enter_reconnecting());
            }
        }
        actions
    }

    /// The open for `attempt` failed before a transport existed.
    pub fn on_transport_failed(&mut self, attempt: u64) -> Vec<CoreAction> {
        if !self.is_current(attempt) || self.state != ConnectionState::Connecting {
            return Vec::new();
        }
        self.enter_reconnecting()
    }

    /// The transport for `attempt` closed or errored.
    pub fn on_transport_closed(&mut self, attempt: u64) -> Vec<CoreAction> {
        if !self.is_current(attempt) || !self.state.is_active() {
            return Vec::new();
        }
        self.enter_reconnecting()
    }

    /// An inbound text frame on the transport for `attempt`.
    pub fn on_frame(&mut self, attempt: u64, text: &str) -> Vec<CoreAction> {
        if !self.is_current(attempt) {
            return Vec::new();
        }
        if !matches!(
            self.state,
            ConnectionState::Authenticating | ConnectionState::Live
        ) {
            return Vec::new();
        }

        let envelope = match Envelope::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding malformed frame");
                return Vec::new();
            }
        };

        if HeartbeatMonitor::is_pong(&envelope) {
            self.heartbeat.record_pong();
            return Vec::new();
        }

        let mut actions = Vec::with_capacity(3);
        if self.state == ConnectionState::Authenticating && self.confirms_login(&envelope) {
            tracing::info!(kind = %envelope.kind, "Login confirmed");
            self.state = ConnectionState::Live;
            self.heartbeat.reset();
            actions.push(CoreAction::StateChanged(ConnectionState::Live));
            actions.push(CoreAction::StartHeartbeat);
        }
        actions.push(CoreAction::Publish(envelope));
        actions
    }

    /// The heartbeat timer fired.
    pub fn on_heartbeat_tick(&mut self) -> Vec<CoreAction> {
        if self.state != ConnectionState::Live {
            return Vec::new();
        }
        match self.heartbeat.on_tick() {
            HeartbeatTick::Ping => vec![CoreAction::Write(HeartbeatMonitor::ping_envelope())],
            HeartbeatTick::Expired { missed } => {
                tracing::warn!(missed, "Heartbeat unanswered, dropping connection");
                self.enter_reconnecting()
            }
        }
    }

    /// The reconnect timer fired.
    pub fn on_retry_elapsed(&mut self) -> Vec<CoreAction> {
        if self.state != ConnectionState::Reconnecting {
            return Vec::new();
        }
        match self.token.clone() {
            Some(token) => self.begin_attempt(token),
            None => self.disconnect(),
        }
    }

    /// Outbound application message. Only written while live.
    pub fn send(&mut self, envelope: Envelope) -> (SendOutcome, Vec<CoreAction>) {
        if self.state == ConnectionState::Live {
            (SendOutcome::Sent, vec![CoreAction::Write(envelope)])
        } else {
            tracing::debug!(kind = %envelope.kind, state = %self.state, "Dropping send while not live");
            (SendOutcome::Dropped, Vec::new())
        }
    }

    fn confirms_login(&self, envelope: &Envelope) -> bool {
        self.confirm_on_first_message
            || message_types::LOGIN_CONFIRMATIONS.contains(&envelope.kind.as_str())
    }

    fn begin_attempt(&mut self, token: String) -> Vec<CoreAction> {
        self.attempt += 1;
        self.token = Some(token.clone());
        self.state = ConnectionState::Connecting;
        tracing::info!(attempt = self.attempt, "Opening gateway connection");
        vec![
            CoreAction::StateChanged(ConnectionState::Connecting),
            CoreAction::OpenTransport {
                attempt: self.attempt,
                token,
            },
        ]
    }

    fn enter_reconnecting(&mut self) -> Vec<CoreAction> {
        self.heartbeat.reset();
        self.state = ConnectionState::Reconnecting;
        vec![
            CoreAction::StopHeartbeat,
            CoreAction::CloseTransport,
            CoreAction::StateChanged(ConnectionState::Reconnecting),
            CoreAction::ScheduleRetry,
        ]
    }
}

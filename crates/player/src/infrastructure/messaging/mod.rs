//! Messaging infrastructure between the session task and its consumers.
//!
//! - `MessageDispatcher`: fan-out of inbound envelopes (push-based subscription)
//! - `ConnectionState` / `ConnectionStateObserver`: lifecycle state for views

pub mod connection;
pub mod dispatcher;

pub use connection::{set_connection_state, ConnectionState, ConnectionStateObserver};
pub use dispatcher::{MessageDispatcher, SubscriptionId};

//! Test doubles for the session runtime.
//!
//! Available under `cfg(test)` and behind the `testing` feature so downstream
//! crates can drive a session without a gateway.

pub mod fixtures;
mod mock_transport;

pub use mock_transport::{MockConnector, MockServer, MockTransport};

//! WebSocket connection to the game gateway
//!
//! - `core`: runtime-free lifecycle state machine
//! - `heartbeat`: ping bookkeeping
//! - `client`: tokio task that owns the transport and timers
//! - `transport`: the `Transport`/`Connector` seam
//! - `adapter`: tokio-tungstenite implementation of the seam

mod adapter;
mod client;
mod core;
mod heartbeat;
mod transport;

pub use adapter::{TungsteniteConnector, TungsteniteTransport};
pub use client::SessionClient;
pub use core::{CoreAction, SessionCore};
pub use heartbeat::{HeartbeatMonitor, HeartbeatTick};
pub use transport::{Connector, Transport, TransportError};

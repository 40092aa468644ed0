pub mod messaging;
pub mod websocket;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use messaging::{ConnectionState, MessageDispatcher};

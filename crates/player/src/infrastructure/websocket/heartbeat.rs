//! Heartbeat monitor.
//!
//! Pure bookkeeping: the session task owns the timer and calls
//! [`HeartbeatMonitor::on_tick`] once per period while the connection is live.

use std::time::Duration;

use idlemmo_shared::{message_types, Envelope};

/// What to do on a heartbeat tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatTick {
    /// Send a `C_Ping`
    Ping,
    /// Too many pings went unanswered; treat the transport as dead
    Expired { missed: u32 },
}

#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    interval: Duration,
    max_missed: Option<u32>,
    outstanding: u32,
}

impl HeartbeatMonitor {
    /// `max_missed` of `None` or `Some(0)` disables expiry.
    pub fn new(interval: Duration, max_missed: Option<u32>) -> Self {
        Self {
            interval,
            max_missed: max_missed.filter(|n| *n > 0),
            outstanding: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Pings sent since the last pong.
    pub fn outstanding(&self) -> u32 {
        self.outstanding
    }

    pub fn on_tick(&mut self) -> HeartbeatTick {
        if let Some(max) = self.max_missed {
            if self.outstanding >= max {
                return HeartbeatTick::Expired {
                    missed: self.outstanding,
                };
            }
        }
        self.outstanding = self.outstanding.saturating_add(1);
        HeartbeatTick::Ping
    }

    pub fn record_pong(&mut self) {
        self.outstanding = 0;
    }

    /// Forget outstanding pings; called whenever the connection leaves live.
    pub fn reset(&mut self) {
        self.outstanding = 0;
    }

    pub fn ping_envelope() -> Envelope {
        Envelope::empty(message_types::C_PING)
    }

    pub fn is_pong(envelope: &Envelope) -> bool {
        envelope.is(message_types::S_PONG)
    }
}

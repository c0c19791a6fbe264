//! Liveness sweep.
//!
//! Each tick clears every connection's liveness flag and sends a ping frame.
//! A connection whose flag is still clear at the next tick never answered and
//! is terminated, so a dead peer is gone within two intervals.

use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{info, trace, warn};

use crate::connection::{ConnectionId, Frame};
use crate::events::DisconnectReason;
use crate::hub::Hub;

/// Shortest period the monitor will tick at.
pub const MIN_HEARTBEAT_PERIOD: Duration = Duration::from_millis(1);

/// Fixed-period timer driving [`Hub::heartbeat_tick`].
#[derive(Debug)]
pub struct HeartbeatMonitor {
    interval: Interval,
}

impl HeartbeatMonitor {
    /// The first tick fires one full `period` from now. A zero period is
    /// raised to [`MIN_HEARTBEAT_PERIOD`].
    pub fn new(period: Duration) -> Self {
        if period < MIN_HEARTBEAT_PERIOD {
            warn!(
                requested_ms = period.as_millis() as u64,
                "heartbeat period too short; clamping"
            );
        }
        let period = period.max(MIN_HEARTBEAT_PERIOD);
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }

    pub async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

impl Hub {
    /// Record a pong from the peer.
    pub fn mark_alive(&mut self, id: &ConnectionId) {
        if let Some(connection) = self.registry.get_mut(id) {
            connection.alive = true;
        }
    }

    /// Run one sweep. Returns the connections terminated by it.
    pub fn heartbeat_tick(&mut self) -> Vec<ConnectionId> {
        let mut expired = Vec::new();

        for connection in self.registry.iter_mut() {
            if connection.alive {
                connection.alive = false;
                connection.transport.send(Frame::Ping);
            } else {
                expired.push(connection.id.clone());
            }
        }

        for id in &expired {
            if let Some(connection) = self.registry.get_mut(id) {
                connection.transport.terminate();
            }
            info!(connection_id = %id, "heartbeat unanswered; terminating");
            self.unregister(id, DisconnectReason::HeartbeatTimeout);
        }

        trace!(
            live = self.registry.len(),
            terminated = expired.len(),
            "heartbeat sweep"
        );
        expired
    }
}

//! Lifecycle events published to in-process observers.
//!
//! Events are sent from the hub task in the order they happen. An observer
//! sees an event at most once, and only if it subscribed before the event
//! fired.

use serde_json::Value;

use crate::connection::ConnectionId;

pub const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The client closed the socket or the transport failed.
    Closed,
    HeartbeatTimeout,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent {
    Connected {
        connection_id: ConnectionId,
        user_id: String,
    },
    Disconnected {
        connection_id: ConnectionId,
        user_id: String,
        reason: DisconnectReason,
    },
    Subscribed {
        connection_id: ConnectionId,
        room: String,
    },
    Unsubscribed {
        connection_id: ConnectionId,
        room: String,
    },
    /// An envelope whose `type` the hub does not route.
    Unhandled {
        connection_id: ConnectionId,
        user_id: String,
        kind: String,
        payload: Value,
    },
}

//! Connection records and the transport handle the hub writes into.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use tokio::sync::mpsc;

/// WebSocket close codes used by the hub and the handshake.
pub mod close_code {
    pub const GOING_AWAY: u16 = 1001;
    pub const POLICY_VIOLATION: u16 = 1008;
    pub const INTERNAL_ERROR: u16 = 1011;
}

/// Opaque connection identity.
///
/// Rendered as `"{user}-{millis}-{seq}"`. Ordering follows the per-hub
/// sequence number, which is registration order.
#[derive(Clone)]
pub struct ConnectionId {
    seq: u64,
    label: Arc<str>,
}

impl ConnectionId {
    pub(crate) fn new(user_id: &str, connected_at: DateTime<Utc>, seq: u64) -> Self {
        let label = format!("{}-{}-{}", user_id, connected_at.timestamp_millis(), seq);
        Self {
            seq,
            label: label.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.label
    }
}

impl PartialEq for ConnectionId {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for ConnectionId {}

impl Hash for ConnectionId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.seq.hash(state);
    }
}

impl PartialOrd for ConnectionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ConnectionId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.seq.cmp(&other.seq)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({})", self.label)
    }
}

impl Serialize for ConnectionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label)
    }
}

/// What the socket writer task is asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    /// Liveness probe; the peer answers with a pong frame.
    Ping,
    Close { code: u16, reason: &'static str },
    /// Drop the socket without a closing handshake.
    Terminate,
}

/// Write side of one client socket.
///
/// Sends never wait: frames are queued on an unbounded channel drained by the
/// socket's writer task.
#[derive(Debug)]
pub struct Transport {
    tx: mpsc::UnboundedSender<Frame>,
    closing: bool,
}

impl Transport {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, closing: false }, rx)
    }

    pub fn is_open(&self) -> bool {
        !self.closing && !self.tx.is_closed()
    }

    /// Queue a frame. Returns `false` when the transport is no longer open.
    pub fn send(&self, frame: Frame) -> bool {
        self.is_open() && self.tx.send(frame).is_ok()
    }

    pub fn close(&mut self, code: u16, reason: &'static str) {
        self.send(Frame::Close { code, reason });
        self.closing = true;
    }

    pub fn terminate(&mut self) {
        self.send(Frame::Terminate);
        self.closing = true;
    }
}

/// One authenticated session held by the hub.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub user_id: String,
    pub transport: Transport,
    /// Names of the rooms this connection belongs to.
    pub rooms: BTreeSet<String>,
    /// Cleared on every heartbeat probe, set again by the peer's pong.
    pub alive: bool,
    pub connected_at: DateTime<Utc>,
}

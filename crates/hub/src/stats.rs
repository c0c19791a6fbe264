//! Point-in-time introspection and the recent-message ring.

use std::collections::VecDeque;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStats {
    pub total_clients: usize,
    pub rooms: Vec<RoomStats>,
    pub pending_messages: usize,
    pub timestamp: String,
}

impl HubStats {
    pub fn room(&self, name: &str) -> Option<&RoomStats> {
        self.rooms.iter().find(|room| room.room == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomStats {
    pub room: String,
    pub members: usize,
}

/// Bounded ring of the most recently routed envelopes.
///
/// Only its size is observable, through [`HubStats::pending_messages`].
/// Delivery never reads from it.
#[derive(Debug)]
pub(crate) struct MessageBuffer {
    capacity: usize,
    entries: VecDeque<String>,
}

impl MessageBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    pub(crate) fn record(&mut self, encoded: &str) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(encoded.to_owned());
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

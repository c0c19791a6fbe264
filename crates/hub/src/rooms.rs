//! Named rooms and their member sets.
//!
//! The directory only knows room → members. The reverse direction lives on
//! each [`crate::Connection`], and [`crate::Hub`] updates both together.

use std::collections::{BTreeMap, BTreeSet};

use crate::connection::ConnectionId;
use crate::stats::RoomStats;

#[derive(Debug)]
pub struct Room {
    pub name: String,
    pub members: BTreeSet<ConnectionId>,
}

impl Room {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            members: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: BTreeMap<String, Room>,
}

impl RoomDirectory {
    /// Add `id` to `room`, creating the room on first use. Returns the member count.
    pub fn join(&mut self, room: &str, id: ConnectionId) -> usize {
        let entry = self
            .rooms
            .entry(room.to_owned())
            .or_insert_with(|| Room::new(room));
        entry.members.insert(id);
        entry.members.len()
    }

    /// Remove `id` from `room`. `None` when it was not a member.
    pub fn leave(&mut self, room: &str, id: &ConnectionId) -> Option<usize> {
        let entry = self.rooms.get_mut(room)?;
        entry.members.remove(id).then(|| entry.members.len())
    }

    pub fn get(&self, room: &str) -> Option<&Room> {
        self.rooms.get(room)
    }

    pub fn is_member(&self, room: &str, id: &ConnectionId) -> bool {
        self.rooms
            .get(room)
            .is_some_and(|entry| entry.members.contains(id))
    }

    pub fn members(&self, room: &str) -> impl Iterator<Item = &ConnectionId> {
        self.rooms
            .get(room)
            .into_iter()
            .flat_map(|entry| entry.members.iter())
    }

    pub fn remove_if_empty(&mut self, room: &str) -> bool {
        if self.rooms.get(room).is_some_and(|entry| entry.members.is_empty()) {
            self.rooms.remove(room);
            return true;
        }
        false
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn member_counts(&self) -> Vec<RoomStats> {
        self.rooms
            .values()
            .map(|entry| RoomStats {
                room: entry.name.clone(),
                members: entry.members.len(),
            })
            .collect()
    }

    pub(crate) fn clear(&mut self) {
        self.rooms.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Transport;
    use crate::registry::ConnectionRegistry;

    fn ids(count: usize) -> Vec<ConnectionId> {
        let mut registry = ConnectionRegistry::default();
        (0..count)
            .map(|n| {
                let (transport, _rx) = Transport::channel();
                registry.insert(format!("u{n}"), transport)
            })
            .collect()
    }

    #[test]
    fn join_is_idempotent_per_connection() {
        let ids = ids(2);
        let mut rooms = RoomDirectory::default();
        assert_eq!(rooms.join("ops", ids[0].clone()), 1);
        assert_eq!(rooms.join("ops", ids[0].clone()), 1);
        assert_eq!(rooms.join("ops", ids[1].clone()), 2);
    }

    #[test]
    fn leave_reports_non_members() {
        let ids = ids(1);
        let mut rooms = RoomDirectory::default();
        assert_eq!(rooms.leave("ops", &ids[0]), None);
        rooms.join("ops", ids[0].clone());
        assert_eq!(rooms.leave("ops", &ids[0]), Some(0));
        assert_eq!(rooms.leave("ops", &ids[0]), None);
    }

    #[test]
    fn empty_rooms_survive_until_explicitly_reaped() {
        let ids = ids(1);
        let mut rooms = RoomDirectory::default();
        rooms.join("ops", ids[0].clone());
        rooms.leave("ops", &ids[0]);
        assert_eq!(rooms.len(), 1);
        assert!(rooms.remove_if_empty("ops"));
        assert!(rooms.is_empty());
    }

    #[test]
    fn member_counts_are_sorted_by_room_name() {
        let ids = ids(2);
        let mut rooms = RoomDirectory::default();
        rooms.join("sales", ids[0].clone());
        rooms.join("ops", ids[0].clone());
        rooms.join("ops", ids[1].clone());

        assert_eq!(
            rooms.member_counts(),
            vec![
                RoomStats {
                    room: "ops".into(),
                    members: 2
                },
                RoomStats {
                    room: "sales".into(),
                    members: 1
                },
            ]
        );
    }
}

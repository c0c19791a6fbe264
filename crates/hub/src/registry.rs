//! Live connection bookkeeping.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use tracing::trace;

use crate::connection::{Connection, ConnectionId, Frame, Transport};

/// Owns every live [`Connection`], iterated in registration order.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: BTreeMap<ConnectionId, Connection>,
    next_seq: u64,
}

impl ConnectionRegistry {
    pub fn insert(&mut self, user_id: String, transport: Transport) -> ConnectionId {
        self.next_seq += 1;
        let connected_at = Utc::now();
        let id = ConnectionId::new(&user_id, connected_at, self.next_seq);

        self.connections.insert(
            id.clone(),
            Connection {
                id: id.clone(),
                user_id,
                transport,
                rooms: BTreeSet::new(),
                alive: true,
                connected_at,
            },
        );
        id
    }

    pub fn remove(&mut self, id: &ConnectionId) -> Option<Connection> {
        self.connections.remove(id)
    }

    pub fn get(&self, id: &ConnectionId) -> Option<&Connection> {
        self.connections.get(id)
    }

    pub fn get_mut(&mut self, id: &ConnectionId) -> Option<&mut Connection> {
        self.connections.get_mut(id)
    }

    /// First live connection of `user_id`, in registration order.
    ///
    /// A user with several sessions is only ever reached on one of them.
    pub fn lookup_by_user(&self, user_id: &str) -> Option<&ConnectionId> {
        self.connections
            .values()
            .find(|connection| connection.user_id == user_id)
            .map(|connection| &connection.id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Connection> {
        self.connections.values_mut()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = Connection> {
        std::mem::take(&mut self.connections).into_values()
    }

    /// Queue `text` on one connection. Closed transports are skipped.
    pub fn deliver(&self, id: &ConnectionId, text: &str) -> bool {
        let Some(connection) = self.connections.get(id) else {
            return false;
        };
        let delivered = connection.transport.send(Frame::Text(text.to_owned()));
        if !delivered {
            trace!(connection_id = %id, "skipping closed transport");
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert(registry: &mut ConnectionRegistry, user: &str) -> ConnectionId {
        let (transport, _rx) = Transport::channel();
        registry.insert(user.to_string(), transport)
    }

    #[test]
    fn reconnects_by_the_same_user_get_fresh_ids() {
        let mut registry = ConnectionRegistry::default();
        let first = insert(&mut registry, "u1");
        registry.remove(&first);
        let second = insert(&mut registry, "u1");
        assert_ne!(first, second);
    }

    #[test]
    fn lookup_by_user_returns_earliest_session() {
        let mut registry = ConnectionRegistry::default();
        let first = insert(&mut registry, "u1");
        let _other = insert(&mut registry, "u2");
        let second = insert(&mut registry, "u1");

        assert_eq!(registry.lookup_by_user("u1"), Some(&first));
        registry.remove(&first);
        assert_eq!(registry.lookup_by_user("u1"), Some(&second));
        assert_eq!(registry.lookup_by_user("nobody"), None);
    }

    #[test]
    fn new_connections_start_alive_with_no_rooms() {
        let mut registry = ConnectionRegistry::default();
        let id = insert(&mut registry, "u1");
        let connection = registry.get(&id).unwrap();
        assert!(connection.alive);
        assert!(connection.rooms.is_empty());
        assert_eq!(connection.user_id, "u1");
    }

    #[test]
    fn deliver_skips_closed_transports() {
        let mut registry = ConnectionRegistry::default();
        let (transport, rx) = Transport::channel();
        let id = registry.insert("u1".into(), transport);
        drop(rx);
        assert!(!registry.deliver(&id, "{}"));
    }
}

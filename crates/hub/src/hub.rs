//! The hub: sole owner of connection and room state.
//!
//! Every method takes `&mut self` and runs to completion; the hub task in
//! [`crate::handle`] is the only caller in production, so no locking is needed.

use beacon_config::HubConfig;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::connection::{close_code, ConnectionId, Frame, Transport};
use crate::envelope::{timestamp, OutboundEnvelope, ServerEvent};
use crate::error::{HubError, HubResult};
use crate::events::{DisconnectReason, HubEvent, EVENT_CHANNEL_CAPACITY};
use crate::registry::ConnectionRegistry;
use crate::rooms::RoomDirectory;
use crate::stats::{HubStats, MessageBuffer};

pub struct Hub {
    pub(crate) config: HubConfig,
    pub(crate) registry: ConnectionRegistry,
    pub(crate) rooms: RoomDirectory,
    pub(crate) buffer: MessageBuffer,
    events: broadcast::Sender<HubEvent>,
    closed: bool,
}

impl Hub {
    pub fn new(config: HubConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            buffer: MessageBuffer::new(config.message_buffer_size),
            config,
            registry: ConnectionRegistry::default(),
            rooms: RoomDirectory::default(),
            events,
            closed: false,
        }
    }

    /// Observe lifecycle events fired from now on.
    pub fn subscribe_events(&self) -> broadcast::Receiver<HubEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<HubEvent> {
        self.events.clone()
    }

    pub(crate) fn emit(&self, event: HubEvent) {
        // No receivers is not an error.
        let _ = self.events.send(event);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Room names `id` belongs to, as recorded on the connection.
    pub fn rooms_of(&self, id: &ConnectionId) -> Option<Vec<String>> {
        self.registry
            .get(id)
            .map(|connection| connection.rooms.iter().cloned().collect())
    }

    /// Member ids of `room`, as recorded on the room.
    pub fn members_of(&self, room: &str) -> Option<Vec<ConnectionId>> {
        self.rooms
            .get(room)
            .map(|entry| entry.members.iter().cloned().collect())
    }

    pub fn register(
        &mut self,
        user_id: impl Into<String>,
        transport: Transport,
    ) -> HubResult<ConnectionId> {
        if self.closed {
            return Err(HubError::Closed);
        }

        let user_id = user_id.into();
        if self.registry.len() >= self.config.max_clients {
            warn!(
                max_clients = self.config.max_clients,
                live = self.registry.len(),
                "connection cap exceeded; accepting anyway"
            );
        }

        let id = self.registry.insert(user_id.clone(), transport);
        self.send_to(
            &id,
            ServerEvent::ConnectionEstablished {
                connection_id: id.clone(),
                user_id: user_id.clone(),
                server_time: timestamp(),
            },
        );

        info!(connection_id = %id, user_id = %user_id, "client connected");
        self.emit(HubEvent::Connected {
            connection_id: id.clone(),
            user_id,
        });
        Ok(id)
    }

    /// Tear down a connection. Returns `false` if it was already gone.
    pub fn unregister(&mut self, id: &ConnectionId, reason: DisconnectReason) -> bool {
        let Some(rooms) = self.rooms_of(id) else {
            return false;
        };

        for room in rooms {
            self.unsubscribe(id, &room);
        }

        let Some(connection) = self.registry.remove(id) else {
            return false;
        };

        info!(
            connection_id = %id,
            user_id = %connection.user_id,
            ?reason,
            "client disconnected"
        );
        self.emit(HubEvent::Disconnected {
            connection_id: connection.id,
            user_id: connection.user_id,
            reason,
        });
        true
    }

    pub fn subscribe(&mut self, id: &ConnectionId, room: &str) {
        let Some(connection) = self.registry.get_mut(id) else {
            debug!(connection_id = %id, room, "subscribe from unknown connection");
            return;
        };
        connection.rooms.insert(room.to_owned());
        let user_id = connection.user_id.clone();

        let member_count = self.rooms.join(room, id.clone());
        debug!(connection_id = %id, room, member_count, "joined room");

        self.emit(HubEvent::Subscribed {
            connection_id: id.clone(),
            room: room.to_owned(),
        });
        self.broadcast_to_room(
            room,
            ServerEvent::RoomUserJoined {
                room: room.to_owned(),
                user_id,
                member_count,
            },
            None,
        );
    }

    pub fn unsubscribe(&mut self, id: &ConnectionId, room: &str) {
        let Some(connection) = self.registry.get_mut(id) else {
            return;
        };
        if !connection.rooms.remove(room) {
            return;
        }
        let user_id = connection.user_id.clone();

        let member_count = self.rooms.leave(room, id).unwrap_or(0);
        debug!(connection_id = %id, room, member_count, "left room");

        self.emit(HubEvent::Unsubscribed {
            connection_id: id.clone(),
            room: room.to_owned(),
        });
        self.broadcast_to_room(
            room,
            ServerEvent::RoomUserLeft {
                room: room.to_owned(),
                user_id,
                member_count,
            },
            None,
        );

        if self.config.reap_empty_rooms && self.rooms.remove_if_empty(room) {
            debug!(room, "reaped empty room");
        }
    }

    /// Send `event` to every member of `room` except `exclude`.
    ///
    /// Returns how many transports accepted the frame.
    pub fn broadcast_to_room(
        &mut self,
        room: &str,
        event: ServerEvent,
        exclude: Option<&ConnectionId>,
    ) -> usize {
        let Some(text) = encode(event) else {
            return 0;
        };
        self.fan_out_to_room(room, &text, exclude)
    }

    pub(crate) fn fan_out_to_room(
        &self,
        room: &str,
        text: &str,
        exclude: Option<&ConnectionId>,
    ) -> usize {
        self.rooms
            .members(room)
            .filter(|member| Some(*member) != exclude)
            .filter(|member| self.registry.deliver(member, text))
            .count()
    }

    /// Send `event` to every connection except `exclude`, in registration order.
    pub(crate) fn broadcast_except(
        &mut self,
        event: ServerEvent,
        exclude: Option<&ConnectionId>,
    ) -> usize {
        let Some(text) = encode(event) else {
            return 0;
        };
        self.buffer.record(&text);

        self.registry
            .iter()
            .filter(|connection| Some(&connection.id) != exclude)
            .filter(|connection| connection.transport.send(Frame::Text(text.clone())))
            .count()
    }

    pub(crate) fn send_to(&mut self, id: &ConnectionId, event: ServerEvent) -> bool {
        encode(event).is_some_and(|text| self.registry.deliver(id, &text))
    }

    /// Best-effort notice to one live session of `user_id`.
    ///
    /// Returns `false` (and does nothing else) when the user is offline.
    pub fn notify_user(&mut self, user_id: &str, data: Value) -> bool {
        let Some(target) = self.registry.lookup_by_user(user_id).cloned() else {
            debug!(user_id, "notification target offline; dropping");
            return false;
        };

        let Some(text) = encode(ServerEvent::Notification { data }) else {
            return false;
        };
        self.buffer.record(&text);
        self.registry.deliver(&target, &text)
    }

    pub fn broadcast_to_all(&mut self, content: Value) -> usize {
        self.broadcast_except(
            ServerEvent::Broadcast {
                from: None,
                content,
            },
            None,
        )
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            total_clients: self.registry.len(),
            rooms: self.rooms.member_counts(),
            pending_messages: self.buffer.len(),
            timestamp: timestamp(),
        }
    }

    /// Drop all state and refuse further registrations.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let connections: Vec<_> = self.registry.drain().collect();
        let dropped = connections.len();
        for mut connection in connections {
            connection
                .transport
                .close(close_code::GOING_AWAY, "Server shutting down");
            self.emit(HubEvent::Disconnected {
                connection_id: connection.id,
                user_id: connection.user_id,
                reason: DisconnectReason::Shutdown,
            });
        }
        self.rooms.clear();
        self.buffer.clear();

        info!(dropped, "hub closed");
    }
}

pub(crate) fn encode(event: ServerEvent) -> Option<String> {
    match OutboundEnvelope::new(event).encode() {
        Ok(text) => Some(text),
        Err(error) => {
            error!(%error, "failed to encode outbound envelope");
            None
        }
    }
}

//! Dispatch of inbound client envelopes.

use tracing::{debug, trace, warn};

use crate::connection::ConnectionId;
use crate::envelope::{ClientEvent, ServerEvent};
use crate::events::HubEvent;
use crate::hub::{encode, Hub};

impl Hub {
    /// Parse and route one text frame. Malformed input is logged and dropped;
    /// the connection stays open and nothing is sent back.
    pub fn handle_text(&mut self, id: &ConnectionId, text: &str) {
        match ClientEvent::parse(text) {
            Ok(event) => self.route(id, event),
            Err(error) => {
                warn!(connection_id = %id, %error, "dropping malformed envelope");
            }
        }
    }

    pub fn route(&mut self, id: &ConnectionId, event: ClientEvent) {
        let Some(sender) = self.registry.get(id).map(|c| c.user_id.clone()) else {
            debug!(connection_id = %id, "envelope from unknown connection");
            return;
        };

        match event {
            ClientEvent::Subscribe { room } => self.subscribe(id, &room),
            ClientEvent::Unsubscribe { room } => self.unsubscribe(id, &room),
            ClientEvent::Broadcast { content } => {
                let delivered = self.broadcast_except(
                    ServerEvent::Broadcast {
                        from: Some(sender),
                        content,
                    },
                    Some(id),
                );
                trace!(connection_id = %id, delivered, "broadcast routed");
            }
            ClientEvent::Direct {
                target_user_id,
                content,
            } => {
                let Some(target) = self.registry.lookup_by_user(&target_user_id).cloned() else {
                    debug!(
                        connection_id = %id,
                        %target_user_id,
                        "direct target offline; dropping"
                    );
                    return;
                };
                let event = ServerEvent::DirectMessage {
                    from: sender,
                    content,
                };
                if let Some(text) = encode(event) {
                    self.buffer.record(&text);
                    self.registry.deliver(&target, &text);
                }
            }
            ClientEvent::Room { room, content } => {
                if self.config.enforce_room_membership && !self.rooms.is_member(&room, id) {
                    debug!(connection_id = %id, %room, "non-member room post dropped");
                    return;
                }
                let Some(text) = encode(ServerEvent::RoomMessage {
                    from: sender,
                    room: room.clone(),
                    content,
                }) else {
                    return;
                };
                self.buffer.record(&text);
                let delivered = self.fan_out_to_room(&room, &text, Some(id));
                trace!(connection_id = %id, %room, delivered, "room message routed");
            }
            ClientEvent::Ping => {
                self.send_to(id, ServerEvent::Pong);
            }
            ClientEvent::Unhandled { kind, payload } => {
                debug!(connection_id = %id, %kind, "forwarding unhandled envelope");
                self.emit(HubEvent::Unhandled {
                    connection_id: id.clone(),
                    user_id: sender,
                    kind,
                    payload,
                });
            }
        }
    }
}

//! The hub task and the handle used to reach it.
//!
//! One task owns the [`Hub`] and applies commands from an unbounded mailbox
//! plus heartbeat ticks, one at a time. Everything else talks to it through a
//! cloneable [`HubHandle`].

use std::ops::ControlFlow;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::connection::{ConnectionId, Transport};
use crate::error::{HubError, HubResult};
use crate::events::{DisconnectReason, HubEvent};
use crate::heartbeat::HeartbeatMonitor;
use crate::hub::Hub;
use crate::stats::HubStats;

#[derive(Debug)]
enum HubCommand {
    Register {
        user_id: String,
        transport: Transport,
        reply: oneshot::Sender<HubResult<ConnectionId>>,
    },
    Unregister {
        connection_id: ConnectionId,
    },
    Inbound {
        connection_id: ConnectionId,
        text: String,
    },
    Pong {
        connection_id: ConnectionId,
    },
    NotifyUser {
        user_id: String,
        data: Value,
    },
    BroadcastToAll {
        content: Value,
    },
    Stats {
        reply: oneshot::Sender<HubStats>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Front door to a running hub.
#[derive(Debug, Clone)]
pub struct HubHandle {
    commands: mpsc::UnboundedSender<HubCommand>,
    events: broadcast::Sender<HubEvent>,
}

impl Hub {
    /// Move the hub onto its own task.
    pub fn spawn(self) -> (HubHandle, JoinHandle<()>) {
        let (commands, mailbox) = mpsc::unbounded_channel();
        let handle = HubHandle {
            commands,
            events: self.event_sender(),
        };
        let task = tokio::spawn(self.run(mailbox));
        (handle, task)
    }

    async fn run(mut self, mut mailbox: mpsc::UnboundedReceiver<HubCommand>) {
        let mut heartbeat = HeartbeatMonitor::new(self.config.heartbeat_interval());
        info!(
            heartbeat_ms = heartbeat.period().as_millis() as u64,
            "hub running"
        );

        loop {
            tokio::select! {
                command = mailbox.recv() => match command {
                    Some(command) => {
                        if self.apply(command).is_break() {
                            break;
                        }
                    }
                    None => {
                        debug!("all hub handles dropped");
                        self.close();
                        break;
                    }
                },
                _ = heartbeat.tick() => {
                    self.heartbeat_tick();
                }
            }
        }
    }

    /// Breaks once the hub has been closed.
    fn apply(&mut self, command: HubCommand) -> ControlFlow<()> {
        match command {
            HubCommand::Register {
                user_id,
                transport,
                reply,
            } => {
                let _ = reply.send(self.register(user_id, transport));
            }
            HubCommand::Unregister { connection_id } => {
                self.unregister(&connection_id, DisconnectReason::Closed);
            }
            HubCommand::Inbound {
                connection_id,
                text,
            } => self.handle_text(&connection_id, &text),
            HubCommand::Pong { connection_id } => self.mark_alive(&connection_id),
            HubCommand::NotifyUser { user_id, data } => {
                self.notify_user(&user_id, data);
            }
            HubCommand::BroadcastToAll { content } => {
                self.broadcast_to_all(content);
            }
            HubCommand::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
            HubCommand::Close { reply } => {
                self.close();
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }
}

impl HubHandle {
    fn dispatch(&self, command: HubCommand) -> HubResult<()> {
        self.commands.send(command).map_err(|_| HubError::Closed)
    }

    pub async fn register(
        &self,
        user_id: impl Into<String>,
        transport: Transport,
    ) -> HubResult<ConnectionId> {
        let (reply, response) = oneshot::channel();
        self.dispatch(HubCommand::Register {
            user_id: user_id.into(),
            transport,
            reply,
        })?;
        response.await.map_err(|_| HubError::Closed)?
    }

    pub fn unregister(&self, connection_id: ConnectionId) {
        let _ = self.dispatch(HubCommand::Unregister { connection_id });
    }

    /// Hand a text frame received from the client to the router.
    pub fn inbound(&self, connection_id: ConnectionId, text: impl Into<String>) {
        let _ = self.dispatch(HubCommand::Inbound {
            connection_id,
            text: text.into(),
        });
    }

    pub fn pong(&self, connection_id: ConnectionId) {
        let _ = self.dispatch(HubCommand::Pong { connection_id });
    }

    /// Push a `notification` to one live session of `user_id`, if any.
    ///
    /// Best effort: an offline user, or a closed hub, drops it silently.
    pub fn notify_user(&self, user_id: impl Into<String>, data: Value) {
        let _ = self.dispatch(HubCommand::NotifyUser {
            user_id: user_id.into(),
            data,
        });
    }

    pub fn broadcast_to_all(&self, content: Value) {
        let _ = self.dispatch(HubCommand::BroadcastToAll { content });
    }

    pub async fn stats(&self) -> HubResult<HubStats> {
        let (reply, response) = oneshot::channel();
        self.dispatch(HubCommand::Stats { reply })?;
        response.await.map_err(|_| HubError::Closed)
    }

    /// Drop all hub state and stop accepting connections. Idempotent.
    pub async fn close(&self) {
        let (reply, response) = oneshot::channel();
        if self.dispatch(HubCommand::Close { reply }).is_ok() {
            let _ = response.await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<HubEvent> {
        self.events.subscribe()
    }
}

//! # Beacon Hub
//!
//! In-memory presence and pub-sub core: live connections, named rooms,
//! envelope routing, heartbeat liveness and best-effort notifications.
//!
//! ## Architecture
//!
//! - **Hub**: owns every connection and room; all mutation goes through it
//! - **Registry / Rooms**: the two halves of membership, kept consistent by the hub
//! - **Router**: dispatch of inbound envelopes by `type`
//! - **Heartbeat**: two-tick liveness sweep
//! - **Handle**: the task that drives the hub and the handle used to reach it
//!
//! ## Usage
//!
//! ```no_run
//! use beacon_config::HubConfig;
//! use beacon_hub::Hub;
//! use serde_json::json;
//!
//! # async fn run() {
//! let (hub, _task) = Hub::new(HubConfig::default()).spawn();
//! hub.notify_user("user-17", json!({ "kind": "leave-approved" }));
//! let stats = hub.stats().await.unwrap();
//! println!("{} clients online", stats.total_clients);
//! # }
//! ```

pub mod connection;
pub mod envelope;
pub mod error;
pub mod events;
pub mod handle;
pub mod heartbeat;
pub mod hub;
pub mod registry;
pub mod rooms;
pub mod router;
pub mod stats;

pub use connection::{close_code, Connection, ConnectionId, Frame, Transport};
pub use envelope::{ClientEvent, OutboundEnvelope, ServerEvent};
pub use error::{EnvelopeError, HubError, HubResult};
pub use events::{DisconnectReason, HubEvent};
pub use handle::HubHandle;
pub use heartbeat::HeartbeatMonitor;
pub use hub::Hub;
pub use registry::ConnectionRegistry;
pub use rooms::{Room, RoomDirectory};
pub use stats::{HubStats, RoomStats};

//! Wire envelopes exchanged with clients.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::connection::ConnectionId;
use crate::error::EnvelopeError;

/// Events received from a client, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientEvent {
    Subscribe {
        room: String,
    },
    Unsubscribe {
        room: String,
    },
    Broadcast {
        #[serde(default)]
        content: Value,
    },
    Direct {
        #[serde(rename = "targetUserId", deserialize_with = "user_id")]
        target_user_id: String,
        #[serde(default)]
        content: Value,
    },
    Room {
        room: String,
        #[serde(default)]
        content: Value,
    },
    Ping,
    /// Any `type` the hub does not route itself. Handed to event observers.
    #[serde(skip)]
    Unhandled { kind: String, payload: Value },
}

impl ClientEvent {
    const ROUTED_TYPES: &'static [&'static str] =
        &["subscribe", "unsubscribe", "broadcast", "direct", "room", "ping"];

    pub fn parse(text: &str) -> Result<Self, EnvelopeError> {
        let value: Value = serde_json::from_str(text)?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(EnvelopeError::MissingType)?
            .to_owned();

        if !Self::ROUTED_TYPES.contains(&kind.as_str()) {
            return Ok(Self::Unhandled {
                kind,
                payload: value,
            });
        }

        serde_json::from_value(value).map_err(|source| EnvelopeError::Invalid { kind, source })
    }
}

/// ERP user ids arrive as strings or as bare integers.
fn user_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}

/// Events sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "connection:established", rename_all = "camelCase")]
    ConnectionEstablished {
        connection_id: ConnectionId,
        user_id: String,
        server_time: String,
    },
    #[serde(rename = "room:user-joined", rename_all = "camelCase")]
    RoomUserJoined {
        room: String,
        user_id: String,
        member_count: usize,
    },
    #[serde(rename = "room:user-left", rename_all = "camelCase")]
    RoomUserLeft {
        room: String,
        user_id: String,
        member_count: usize,
    },
    #[serde(rename = "broadcast")]
    Broadcast {
        #[serde(skip_serializing_if = "Option::is_none")]
        from: Option<String>,
        content: Value,
    },
    #[serde(rename = "direct:message")]
    DirectMessage { from: String, content: Value },
    #[serde(rename = "room:message")]
    RoomMessage {
        from: String,
        room: String,
        content: Value,
    },
    #[serde(rename = "pong")]
    Pong,
    #[serde(rename = "notification")]
    Notification { data: Value },
}

/// A [`ServerEvent`] stamped with the time it left the hub.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundEnvelope {
    #[serde(flatten)]
    pub event: ServerEvent,
    pub timestamp: String,
}

impl OutboundEnvelope {
    pub fn new(event: ServerEvent) -> Self {
        Self {
            event,
            timestamp: timestamp(),
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// RFC 3339 UTC with millisecond precision.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

//! The `/ws` endpoint.
//!
//! Credentials are checked before the upgrade. A socket that fails the check
//! is still upgraded and then closed with a policy-violation frame, so
//! browser clients see the reason. An accepted socket is registered with the
//! hub and split into a writer task draining the hub's frames and a reader
//! task forwarding client frames to the hub.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::HeaderMap,
    response::Response,
};
use beacon_hub::{ConnectionId, Frame, HubHandle, Transport};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::error::GatewayError;
use crate::state::GatewayState;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<Arc<GatewayState>>,
) -> Response {
    let verdict = state
        .authenticator
        .authenticate_headers(&headers)
        .await
        .map_err(GatewayError::from);

    ws.on_upgrade(move |socket| async move {
        match verdict {
            Ok(user_id) => handle_socket(socket, state.hub.clone(), user_id).await,
            Err(error) => reject(socket, error).await,
        }
    })
}

async fn reject(mut socket: WebSocket, error: GatewayError) {
    match &error {
        GatewayError::Unauthorized(_) => info!(%error, "rejecting websocket"),
        _ => warn!(%error, "rejecting websocket"),
    }
    let _ = socket.send(Message::Close(Some(error.close_frame()))).await;
}

async fn handle_socket(socket: WebSocket, hub: HubHandle, user_id: String) {
    let (transport, frames) = Transport::channel();
    let connection_id = match hub.register(user_id.clone(), transport).await {
        Ok(id) => id,
        Err(error) => {
            reject(socket, error.into()).await;
            return;
        }
    };

    let (sink, stream) = socket.split();
    let mut writer = tokio::spawn(write_frames(sink, frames));
    let mut reader = tokio::spawn(read_messages(stream, hub.clone(), connection_id.clone()));

    // Whichever half finishes first takes the other down with it.
    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    hub.unregister(connection_id.clone());
    debug!(connection_id = %connection_id, user_id = %user_id, "websocket finished");
}

async fn write_frames(
    mut sink: SplitSink<WebSocket, Message>,
    mut frames: UnboundedReceiver<Frame>,
) {
    while let Some(frame) = frames.recv().await {
        let (message, last) = match frame {
            Frame::Text(text) => (Message::Text(text), false),
            Frame::Ping => (Message::Ping(Vec::new()), false),
            Frame::Close { code, reason } => (
                Message::Close(Some(CloseFrame {
                    code,
                    reason: reason.into(),
                })),
                true,
            ),
            Frame::Terminate => break,
        };

        if let Err(error) = sink.send(message).await {
            debug!(%error, "websocket write failed");
            break;
        }
        if last {
            break;
        }
    }
}

async fn read_messages(
    mut stream: SplitStream<WebSocket>,
    hub: HubHandle,
    connection_id: ConnectionId,
) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => hub.inbound(connection_id.clone(), text),
            Ok(Message::Pong(_)) => hub.pong(connection_id.clone()),
            Ok(Message::Close(_)) => break,
            // Answered by the protocol layer.
            Ok(Message::Ping(_)) => {}
            Ok(Message::Binary(bytes)) => {
                debug!(
                    connection_id = %connection_id,
                    len = bytes.len(),
                    "ignoring binary frame"
                );
            }
            Err(error) => {
                debug!(connection_id = %connection_id, %error, "websocket read failed");
                break;
            }
        }
    }
}

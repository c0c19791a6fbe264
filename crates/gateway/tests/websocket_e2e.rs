//! End-to-end tests: a real listener, real sockets, real handshakes.

use std::net::SocketAddr;
use std::time::Duration;

use beacon_auth::Authenticator;
use beacon_config::{AuthConfig, HubConfig};
use beacon_gateway::{create_router, GatewayState};
use beacon_hub::{Hub, HubHandle};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestApp {
    addr: SocketAddr,
    hub: HubHandle,
    authenticator: Authenticator,
}

impl TestApp {
    async fn spawn(hub_config: HubConfig) -> Self {
        let auth_config = AuthConfig {
            static_tokens: [("alice-token", "alice"), ("bob-token", "bob")]
                .into_iter()
                .map(|(token, user)| (token.to_string(), user.to_string()))
                .collect(),
            ..AuthConfig::default()
        };
        let authenticator = Authenticator::new(auth_config);
        let (hub, _task) = Hub::new(hub_config).spawn();
        let router = create_router(GatewayState::new(hub.clone(), authenticator.clone()));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            addr,
            hub,
            authenticator,
        }
    }

    async fn connect(&self, token: Option<&str>) -> Client {
        let mut request = format!("ws://{}/ws", self.addr)
            .into_client_request()
            .unwrap();
        if let Some(token) = token {
            request.headers_mut().insert(
                header::AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
            );
        }
        let (socket, _response) = connect_async(request).await.unwrap();
        socket
    }

    /// Connect and consume the `connection:established` acknowledgement.
    async fn connect_as(&self, token: &str) -> (Client, Value) {
        let mut client = self.connect(Some(token)).await;
        let established = next_json(&mut client).await;
        assert_eq!(established["type"], "connection:established");
        (client, established)
    }
}

async fn next_message(client: &mut Client) -> Message {
    tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .expect("timed out waiting for a frame")
        .expect("socket ended")
        .expect("socket error")
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        match next_message(client).await {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected message {other:?}"),
        }
    }
}

async fn send_json(client: &mut Client, value: Value) {
    client.send(Message::Text(value.to_string())).await.unwrap();
}

#[tokio::test]
async fn handshake_acknowledges_with_connection_details() {
    let app = TestApp::spawn(HubConfig::default()).await;

    let (_client, established) = app.connect_as("alice-token").await;

    assert_eq!(established["userId"], "alice");
    let connection_id = established["connectionId"].as_str().unwrap();
    assert!(connection_id.starts_with("alice-"));
    assert!(established["serverTime"].is_string());
    assert!(established["timestamp"].is_string());
}

#[tokio::test]
async fn issued_sessions_authenticate() {
    let app = TestApp::spawn(HubConfig::default()).await;
    let session = app.authenticator.issue_session("carol").await;

    let (_client, established) = app.connect_as(&session.token).await;

    assert_eq!(established["userId"], "carol");
}

#[tokio::test]
async fn unknown_token_is_closed_with_policy_violation() {
    let app = TestApp::spawn(HubConfig::default()).await;

    for token in [Some("forged"), None] {
        let mut client = app.connect(token).await;
        match next_message(&mut client).await {
            Message::Close(Some(frame)) => {
                assert_eq!(u16::from(frame.code), 1008);
                assert_eq!(frame.reason, "Unauthorized");
            }
            other => panic!("expected close frame, got {other:?}"),
        }
    }
    assert_eq!(app.hub.stats().await.unwrap().total_clients, 0);
}

#[tokio::test]
async fn room_messages_flow_between_members() {
    let app = TestApp::spawn(HubConfig::default()).await;
    let (mut alice, _) = app.connect_as("alice-token").await;
    let (mut bob, _) = app.connect_as("bob-token").await;

    send_json(&mut alice, json!({"type": "subscribe", "room": "payroll"})).await;
    let joined = next_json(&mut alice).await;
    assert_eq!(joined["type"], "room:user-joined");
    assert_eq!(joined["memberCount"], 1);

    send_json(&mut bob, json!({"type": "subscribe", "room": "payroll"})).await;
    for client in [&mut alice, &mut bob] {
        let joined = next_json(client).await;
        assert_eq!(joined["userId"], "bob");
        assert_eq!(joined["memberCount"], 2);
    }

    send_json(
        &mut alice,
        json!({"type": "room", "room": "payroll", "content": {"run": "2026-10"}}),
    )
    .await;
    let message = next_json(&mut bob).await;
    assert_eq!(message["type"], "room:message");
    assert_eq!(message["from"], "alice");
    assert_eq!(message["content"]["run"], "2026-10");

    send_json(&mut alice, json!({"type": "ping"})).await;
    assert_eq!(next_json(&mut alice).await["type"], "pong");

    let stats = app.hub.stats().await.unwrap();
    assert_eq!(stats.total_clients, 2);
    assert_eq!(stats.room("payroll").map(|room| room.members), Some(2));
}

#[tokio::test]
async fn direct_messages_and_notifications_reach_the_user() {
    let app = TestApp::spawn(HubConfig::default()).await;
    let (mut alice, _) = app.connect_as("alice-token").await;
    let (mut bob, _) = app.connect_as("bob-token").await;

    send_json(
        &mut alice,
        json!({"type": "direct", "targetUserId": "bob", "content": "approve?"}),
    )
    .await;
    let direct = next_json(&mut bob).await;
    assert_eq!(direct["type"], "direct:message");
    assert_eq!(direct["from"], "alice");
    assert_eq!(direct["content"], "approve?");

    app.hub.notify_user("bob", json!({"leave": "approved"}));
    let notice = next_json(&mut bob).await;
    assert_eq!(notice["type"], "notification");
    assert_eq!(notice["data"]["leave"], "approved");
}

#[tokio::test]
async fn binary_frames_are_ignored_without_dropping_the_client() {
    let app = TestApp::spawn(HubConfig::default()).await;
    let (mut alice, _) = app.connect_as("alice-token").await;

    alice
        .send(Message::Binary(vec![0xde, 0xad, 0xbe, 0xef]))
        .await
        .unwrap();
    send_json(&mut alice, json!({"type": "ping"})).await;

    assert_eq!(next_json(&mut alice).await["type"], "pong");
    assert_eq!(app.hub.stats().await.unwrap().total_clients, 1);
}

#[tokio::test]
async fn closing_the_socket_unregisters_the_client() {
    let app = TestApp::spawn(HubConfig::default()).await;
    let (mut alice, _) = app.connect_as("alice-token").await;
    let (mut bob, _) = app.connect_as("bob-token").await;
    send_json(&mut alice, json!({"type": "subscribe", "room": "ops"})).await;
    next_json(&mut alice).await;
    send_json(&mut bob, json!({"type": "subscribe", "room": "ops"})).await;
    next_json(&mut alice).await;
    next_json(&mut bob).await;

    bob.close(None).await.unwrap();

    let left = next_json(&mut alice).await;
    assert_eq!(left["type"], "room:user-left");
    assert_eq!(left["userId"], "bob");
    assert_eq!(left["memberCount"], 1);
    assert_eq!(app.hub.stats().await.unwrap().total_clients, 1);
}

#[tokio::test]
async fn silent_client_is_dropped_after_two_heartbeats() {
    let app = TestApp::spawn(HubConfig {
        heartbeat_interval_ms: 50,
        ..HubConfig::default()
    })
    .await;
    // Never reading means pings are never answered.
    let _silent = app.connect(Some("alice-token")).await;

    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(app.hub.stats().await.unwrap().total_clients, 0);
}

#[tokio::test]
async fn shutdown_closes_clients_with_going_away() {
    let app = TestApp::spawn(HubConfig::default()).await;
    let (mut alice, _) = app.connect_as("alice-token").await;

    app.hub.close().await;

    match next_message(&mut alice).await {
        Message::Close(Some(frame)) => {
            assert_eq!(u16::from(frame.code), 1001);
            assert_eq!(frame.reason, "Server shutting down");
        }
        other => panic!("expected close frame, got {other:?}"),
    }

    let mut late = app.connect(Some("bob-token")).await;
    match next_message(&mut late).await {
        Message::Close(Some(frame)) => assert_eq!(u16::from(frame.code), 1011),
        other => panic!("expected close frame, got {other:?}"),
    }
}

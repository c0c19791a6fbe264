//! # Beacon Gateway
//!
//! HTTP and WebSocket front end for the hub.
//!
//! - `GET /ws`: authenticated WebSocket upgrade, bridged onto the hub
//! - `GET /health`: liveness probe
//! - `GET /api/stats`: hub snapshot
//!
//! ## Usage
//!
//! ```no_run
//! use beacon_auth::Authenticator;
//! use beacon_gateway::{create_router, GatewayState};
//! # async fn run(hub: beacon_hub::HubHandle, authenticator: Authenticator) {
//! let app = create_router(GatewayState::new(hub, authenticator));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:7070").await.unwrap();
//! axum::serve(listener, app).await.unwrap();
//! # }
//! ```

pub mod error;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod websocket;

pub use error::{GatewayError, GatewayResult};
pub use state::GatewayState;

use std::sync::Arc;

use axum::{middleware as axum_middleware, routing::get, Router};

/// Create the main application router with all routes
pub fn create_router(state: GatewayState) -> Router {
    let state = Arc::new(state);
    Router::new()
        .merge(rest::create_rest_routes())
        .route("/ws", get(websocket::websocket_handler))
        .with_state(state)
        .layer(middleware::create_cors_middleware())
        .layer(middleware::create_trace_middleware())
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
}

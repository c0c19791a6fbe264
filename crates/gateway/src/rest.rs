//! Read-only HTTP endpoints.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use beacon_hub::HubStats;
use serde::Serialize;

use crate::error::GatewayResult;
use crate::state::GatewayState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub fn create_rest_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/stats", get(hub_stats))
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Snapshot of live clients, room sizes and the recent-message ring.
pub async fn hub_stats(State(state): State<Arc<GatewayState>>) -> GatewayResult<Json<HubStats>> {
    Ok(Json(state.hub.stats().await?))
}

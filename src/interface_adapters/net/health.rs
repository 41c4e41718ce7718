use crate::interface_adapters::state::AppState;

use axum::extract::{Json, State};
use std::sync::Arc;

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: &'static str,
    uptime_seconds: u64,
    active_rooms: usize,
    // Rooms still waiting for an opponent.
    waiting_rooms: usize,
    // Seated players, counting seats held by in-flight restores.
    connected_players: usize,
    pending_reconnections: usize,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let stats = state.registry.stats().await;
    Json(HealthResponse {
        status: "ok",
        uptime_seconds: state.started_at.elapsed().as_secs(),
        active_rooms: stats.active_rooms,
        waiting_rooms: stats.waiting_rooms,
        connected_players: stats.seated_players,
        pending_reconnections: state.reconnections.pending(),
    })
}

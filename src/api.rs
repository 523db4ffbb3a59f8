//! HTTP API endpoints.
//!
//! Used by the lobby page to check a room code before connecting.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::error::GameError;
use crate::state::AppState;
use crate::types::RoomId;

/// Public summary of a room. Never includes roles or the item.
#[derive(Debug, Clone, Serialize)]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub room_name: String,
    pub max_players: usize,
    pub player_count: usize,
    pub host_name: Option<String>,
    pub game_started: bool,
    /// Whether a join would currently be accepted
    pub joinable: bool,
}

/// Look up a room by its code.
///
/// GET /api/rooms/{room_id}
pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Response {
    match state.lookup_room(&room_id).await {
        Ok(room) => Json(RoomSummary {
            room_id: room.room_id.clone(),
            room_name: room.room_name.clone(),
            max_players: room.max_players,
            player_count: room.players.len(),
            host_name: room.host().map(|p| p.name.clone()),
            game_started: room.game_started,
            joinable: !room.game_started && !room.is_full(),
        })
        .into_response(),
        Err(e) => {
            let status = match e {
                GameError::RoomNotFound => StatusCode::NOT_FOUND,
                GameError::ConnectionFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            if status != StatusCode::NOT_FOUND {
                tracing::error!("Room lookup for {} failed: {}", room_id, e);
            }
            (status, e.to_string()).into_response()
        }
    }
}

/// GET /health
pub async fn health() -> &'static str {
    "ok"
}

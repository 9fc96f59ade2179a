//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{domain::RoomId, infrastructure::dto::http::RoomPresenceDto, ui::state::AppState};

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Presence of one room as seen by this process
pub async fn room_presence(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomPresenceDto>, StatusCode> {
    let room_id = match RoomId::try_from(room_id) {
        Ok(room_id) => room_id,
        Err(e) => {
            tracing::warn!("Invalid room id: {}", e);
            return Err(StatusCode::BAD_REQUEST);
        }
    };

    let snapshot = state.context.presence.snapshot(&room_id).await;

    // Domain Model から DTO への変換
    Ok(Json(RoomPresenceDto {
        room_id: room_id.into_string(),
        online_users_count: snapshot.online_users_count,
        local_connections: snapshot.local_connections,
        degraded: snapshot.degraded,
    }))
}

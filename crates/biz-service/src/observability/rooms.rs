//! Room introspection endpoint.
//!
//! `GET /` returns one JSON object per live room, ordered by sid.

use crate::rooms::{RoomRegistry, RoomSummary};
use axum::{extract::State, routing::get, Json, Router};
use std::sync::Arc;
use tracing::instrument;

pub fn rooms_router(registry: Arc<RoomRegistry>) -> Router {
    Router::new()
        .route("/", get(list_rooms))
        .with_state(registry)
}

#[instrument(skip_all, name = "biz.http.rooms")]
async fn list_rooms(State(registry): State<Arc<RoomRegistry>>) -> Json<Vec<RoomSummary>> {
    let mut rooms = registry.summaries().await;
    rooms.sort_by(|a, b| a.sid.cmp(&b.sid));
    Json(rooms)
}

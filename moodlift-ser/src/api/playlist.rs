//! Playlist lookup endpoint

use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use moodlift_common::Playlist;

/// GET /playlist/:emotion
///
/// Unknown emotions get the `neutral` playlist.
pub async fn get_playlist(
    State(state): State<AppState>,
    Path(emotion): Path<String>,
) -> ApiResult<Json<Playlist>> {
    let emotion = emotion.trim().to_lowercase();
    state
        .playlists
        .lookup(&emotion)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No playlist for '{}'", emotion)))
}

/// Build playlist routes
pub fn playlist_routes() -> Router<AppState> {
    Router::new().route("/playlist/:emotion", get(get_playlist))
}

//! Negative-cache clear trigger (spec §4.9: "a `clear` operation exists for
//! administrators").

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use super::auth::SessionGuard;
use crate::state::AppState;
use crate::Result;

pub async fn clear_negative_cache(
    State(state): State<Arc<AppState>>,
    SessionGuard(session): SessionGuard,
) -> Result<impl IntoResponse> {
    let cleared = state.coordinator.clear_negative_cache();
    state
        .db
        .record_audit(&session.user_id, "autodownload.negative_cache.clear", "*", true, None, Some(&cleared.to_string()))
        .await?;
    Ok(Json(serde_json::json!({ "cleared": cleared })))
}

//! On-demand database backup trigger (spec §4.2's `VACUUM INTO`, exposed
//! here so an administrator doesn't have to wait for the scheduled
//! `backup_interval_hours` sweep).

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;

use super::auth::SessionGuard;
use crate::state::AppState;
use crate::Result;

pub async fn trigger(State(state): State<Arc<AppState>>, SessionGuard(session): SessionGuard) -> Result<impl IntoResponse> {
    let filename = format!("tfmirror-{}.db", Utc::now().format("%Y%m%dT%H%M%S"));
    let path = state.config.database.path.parent().unwrap_or_else(|| std::path::Path::new(".")).join(&filename);

    state.db.backup_to(&path).await?;

    // Spec §4.2: the snapshot also lands in the Object Store under a
    // configured prefix when one is set, so it survives loss of local disk.
    let object_key = if let Some(prefix) = &state.config.database.backup_prefix {
        let bytes = tokio::fs::read(&path).await.map_err(|err| crate::Error::StorageIO(err.to_string()))?;
        let key = format!("{}/{filename}", prefix.trim_end_matches('/'));
        state.storage.upload(&key, bytes, "application/vnd.sqlite3").await?;
        Some(key)
    } else {
        None
    };

    state
        .db
        .record_audit(&session.user_id, "database.backup", &path.display().to_string(), true, None, object_key.as_deref())
        .await?;

    Ok(Json(serde_json::json!({ "path": path.display().to_string(), "object_key": object_key })))
}

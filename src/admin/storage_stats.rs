//! Aggregate storage statistics.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::auth::SessionGuard;
use crate::state::AppState;
use crate::Result;

#[derive(Serialize)]
pub struct StorageStats {
    pub provider_count: i64,
    pub provider_bytes: i64,
    pub module_count: i64,
    pub module_bytes: i64,
    pub total_bytes: i64,
}

pub async fn get(State(state): State<Arc<AppState>>, _guard: SessionGuard) -> Result<Json<StorageStats>> {
    let provider_count = state.db.count_providers().await?;
    let provider_bytes = state.db.sum_provider_bytes().await?;
    let module_count = state.db.count_modules().await?;
    let module_bytes = state.db.sum_module_bytes().await?;

    Ok(Json(StorageStats {
        provider_count,
        provider_bytes,
        module_count,
        module_bytes,
        total_bytes: provider_bytes + module_bytes,
    }))
}

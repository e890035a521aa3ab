//! Artifact inventory management: list, deprecate/block, delete.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use super::auth::SessionGuard;
use super::jobs::Pagination;
use crate::db::{ModuleRecord, ProviderRecord};
use crate::state::AppState;
use crate::Result;

pub async fn list_providers(
    State(state): State<Arc<AppState>>,
    _guard: SessionGuard,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<ProviderRecord>>> {
    Ok(Json(state.db.list_providers(page.limit, page.offset).await?))
}

pub async fn list_modules(
    State(state): State<Arc<AppState>>,
    _guard: SessionGuard,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<ModuleRecord>>> {
    Ok(Json(state.db.list_modules(page.limit, page.offset).await?))
}

#[derive(Deserialize)]
pub struct FlagsRequest {
    pub deprecated: Option<bool>,
    pub blocked: Option<bool>,
}

pub async fn patch_provider(
    State(state): State<Arc<AppState>>,
    SessionGuard(session): SessionGuard,
    Path(id): Path<i64>,
    Json(flags): Json<FlagsRequest>,
) -> Result<impl IntoResponse> {
    state.db.set_provider_flags(id, flags.deprecated, flags.blocked).await?;
    state
        .db
        .record_audit(&session.user_id, "provider.flags", &id.to_string(), true, None, None)
        .await?;
    Ok(Json(serde_json::json!({ "updated": true })))
}

pub async fn delete_provider(
    State(state): State<Arc<AppState>>,
    SessionGuard(session): SessionGuard,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.db.delete_provider(id).await?;
    state
        .db
        .record_audit(&session.user_id, "provider.delete", &id.to_string(), true, None, None)
        .await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

pub async fn patch_module(
    State(state): State<Arc<AppState>>,
    SessionGuard(session): SessionGuard,
    Path(id): Path<i64>,
    Json(flags): Json<FlagsRequest>,
) -> Result<impl IntoResponse> {
    state.db.set_module_flags(id, flags.deprecated, flags.blocked).await?;
    state
        .db
        .record_audit(&session.user_id, "module.flags", &id.to_string(), true, None, None)
        .await?;
    Ok(Json(serde_json::json!({ "updated": true })))
}

pub async fn delete_module(
    State(state): State<Arc<AppState>>,
    SessionGuard(session): SessionGuard,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.db.delete_module(id).await?;
    state
        .db
        .record_audit(&session.user_id, "module.delete", &id.to_string(), true, None, None)
        .await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

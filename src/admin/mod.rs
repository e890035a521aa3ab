//! Admin Control Plane (spec §4.11): job and artifact CRUD, storage
//! statistics, redacted configuration view, and the backup trigger.
//! Authentication is the `SessionGuard` extractor; the collaborator schema
//! (session creation/login) lives outside this crate's scope (spec §1).

mod artifacts;
pub mod auth;
mod autodownload;
mod backup;
mod config_view;
mod jobs;
mod storage_stats;

use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/admin/api/jobs", get(jobs::list).post(jobs::submit))
        .route("/admin/api/jobs/{id}", get(jobs::get))
        .route("/admin/api/jobs/{id}/retry", post(jobs::retry))
        .route("/admin/api/jobs/{id}/cancel", post(jobs::cancel))
        .route("/admin/api/providers", get(artifacts::list_providers))
        .route(
            "/admin/api/providers/{id}",
            patch(artifacts::patch_provider).delete(artifacts::delete_provider),
        )
        .route("/admin/api/modules", get(artifacts::list_modules))
        .route(
            "/admin/api/modules/{id}",
            patch(artifacts::patch_module).delete(artifacts::delete_module),
        )
        .route("/admin/api/stats/storage", get(storage_stats::get))
        .route("/admin/api/config", get(config_view::get))
        .route("/admin/api/backup", post(backup::trigger))
        .route("/admin/api/autodownload/negative-cache", post(autodownload::clear_negative_cache))
        .with_state(state)
}

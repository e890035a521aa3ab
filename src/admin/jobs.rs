//! Job list/get/submit/retry/cancel endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::auth::SessionGuard;
use crate::db::{Job, JobItem, JobKind};
use crate::jobs;
use crate::state::AppState;
use crate::Result;

#[derive(Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    _guard: SessionGuard,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<Job>>> {
    Ok(Json(state.db.list_jobs(page.limit, page.offset).await?))
}

#[derive(Serialize)]
pub struct JobDetail {
    #[serde(flatten)]
    pub job: Job,
    pub items: Vec<JobItem>,
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    _guard: SessionGuard,
    Path(id): Path<String>,
) -> Result<Json<JobDetail>> {
    let job = state.db.get_job(&id).await?.ok_or_else(|| crate::Error::NotFound(format!("job {id}")))?;
    let items = state.db.list_job_items(&id).await?;
    Ok(Json(JobDetail { job, items }))
}

#[derive(Deserialize)]
pub struct SubmitRequest {
    pub kind: JobKind,
    pub manifest: String,
}

pub async fn submit(
    State(state): State<Arc<AppState>>,
    SessionGuard(session): SessionGuard,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<Job>> {
    let job = jobs::submit_job(&state.db, request.kind, &request.manifest).await?;
    state
        .db
        .record_audit(&session.user_id, "job.submit", &job.id, true, None, None)
        .await?;
    Ok(Json(job))
}

pub async fn retry(
    State(state): State<Arc<AppState>>,
    SessionGuard(session): SessionGuard,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let reset_count = state.job_engine.retry(&id).await?;
    state
        .db
        .record_audit(&session.user_id, "job.retry", &id, true, None, Some(&reset_count.to_string()))
        .await?;
    Ok(Json(serde_json::json!({ "reset_items": reset_count })))
}

pub async fn cancel(
    State(state): State<Arc<AppState>>,
    SessionGuard(session): SessionGuard,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    state.job_engine.cancel(&id).await?;
    state.db.record_audit(&session.user_id, "job.cancel", &id, true, None, None).await?;
    Ok(Json(serde_json::json!({ "cancelled": true })))
}

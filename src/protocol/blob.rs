//! Byte-stream proxy for the local-filesystem storage backend.
//!
//! `object_store`/`aws-sdk-s3` can mint a real presigned URL for S3; the
//! local backend can't, so `Storage::presign` returns a `Local` key and the
//! protocol layer serves the object itself here instead of redirecting.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;

use crate::state::AppState;
use crate::Result;

pub async fn serve(State(state): State<Arc<AppState>>, Path(key): Path<String>) -> Result<impl IntoResponse> {
    let bytes = state.storage.download(&key).await?;
    let content_type = if key.ends_with(".zip") { "application/zip" } else { "application/gzip" };

    Ok(([(header::CONTENT_TYPE, content_type)], bytes))
}

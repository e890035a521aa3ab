//! Read-only configuration view with secrets redacted.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use super::auth::SessionGuard;
use crate::config::Config;
use crate::state::AppState;
use crate::Result;

const REDACTED: &str = "[redacted]";

pub async fn get(State(state): State<Arc<AppState>>, _guard: SessionGuard) -> Result<Json<Config>> {
    let mut config = (*state.config).clone();
    if config.storage.access_key.is_some() {
        config.storage.access_key = Some(REDACTED.to_string());
    }
    if config.storage.secret_key.is_some() {
        config.storage.secret_key = Some(REDACTED.to_string());
    }
    if config.auth.jwt_secret.is_some() {
        config.auth.jwt_secret = Some(REDACTED.to_string());
    }
    Ok(Json(config))
}

//! Session-based authentication for the admin control plane (spec §4.11).
//! Every mutating endpoint audit-logs under the session's `user_id`.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::db::Session;
use crate::state::AppState;
use crate::{Error, Result};

pub struct SessionGuard(pub Session);

impl FromRequestParts<Arc<AppState>> for SessionGuard {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| Error::Unauthorized("missing authorization header".to_string()))?;

        let jti = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| Error::Unauthorized("expected a bearer token".to_string()))?;

        if !state.db.session_is_valid(jti).await? {
            return Err(Error::Unauthorized("session expired, revoked, or unknown".to_string()));
        }

        let session = state
            .db
            .find_session_by_jti(jti)
            .await?
            .ok_or_else(|| Error::Unauthorized("session expired, revoked, or unknown".to_string()))?;

        Ok(SessionGuard(session))
    }
}

//! `GET /.well-known/terraform.json` service discovery document.

use axum::Json;
use serde_json::{json, Value};

pub async fn service_discovery() -> Json<Value> {
    Json(json!({
        "providers.v1": "/v1/providers/",
    }))
}

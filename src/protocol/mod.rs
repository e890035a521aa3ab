//! Protocol Serving Layer (spec §4.10): the HTTP surface Terraform itself
//! talks to — service discovery, the Provider Network Mirror Protocol, and
//! the Module Registry Protocol. Built on `axum`, matching the teacher's
//! router composition style; `server::run` layers `TraceLayer` and
//! `RequestDecompressionLayer` over this router merged with the admin one.
//!
//! Every provider/module endpoint follows the same read-through path: two
//! tier cache, then the Metadata Store, then (on a miss) the Auto-Download
//! Coordinator. `cache_through` holds the one pipeline function both
//! `providers` and `modules` call, differing only in key construction and
//! response shape.

mod blob;
mod cache_through;
mod discovery;
mod modules;
mod providers;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/.well-known/terraform.json", get(discovery::service_discovery))
        .route("/v1/providers/{namespace}/{type}/versions", get(providers::versions))
        .route(
            "/v1/providers/{namespace}/{type}/{version}/download/{os}/{arch}",
            get(providers::download),
        )
        .route("/v1/modules/{namespace}/{name}/{system}/versions", get(modules::versions))
        .route("/v1/modules/{namespace}/{name}/{system}/{version}/download", get(modules::download))
        .route("/blob/{*key}", get(blob::serve))
        .with_state(state)
}

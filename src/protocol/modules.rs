//! Module Registry Protocol endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use serde::Serialize;

use super::cache_through::{fetch_or_compute, presign_ttl};
use crate::autodownload::Outcome;
use crate::cache::CacheStatus;
use crate::db::{Identity, ModuleRecord};
use crate::ingest::IndexedArtifact;
use crate::state::AppState;
use crate::{Error, Result};

#[derive(Serialize)]
struct ModulesResponse {
    modules: Vec<ModuleVersions>,
}

#[derive(Serialize)]
struct ModuleVersions {
    versions: Vec<VersionEntry>,
}

#[derive(Serialize)]
struct VersionEntry {
    version: String,
}

pub async fn versions(
    State(state): State<Arc<AppState>>,
    Path((namespace, name, system)): Path<(String, String, String)>,
) -> Result<impl IntoResponse> {
    let key = format!("modules:{namespace}/{name}/{system}:versions");

    let (status, bytes) = fetch_or_compute(&state, &key, "application/json", || async {
        let versions = state.db.list_module_versions(&namespace, &name, &system).await?;
        let entries = versions.into_iter().map(|version| VersionEntry { version }).collect();

        let response = ModulesResponse { modules: vec![ModuleVersions { versions: entries }] };
        serde_json::to_vec(&response).map_err(|err| Error::Fatal(err.to_string()))
    })
    .await?;

    let mut headers = HeaderMap::new();
    headers.insert("X-Cache", cache_header_value(status));
    headers.insert(
        axum::http::header::CONTENT_TYPE,
        "application/json".parse().expect("static header value"),
    );
    Ok((headers, bytes))
}

pub async fn download(
    State(state): State<Arc<AppState>>,
    Path((namespace, name, system, version)): Path<(String, String, String, String)>,
) -> Result<impl IntoResponse> {
    let key = format!("modules:{namespace}/{name}/{system}/{version}:download");

    let (status, bytes) = fetch_or_compute(&state, &key, "text/plain", || async {
        let record = match state.db.find_module(&namespace, &name, &system, &version).await? {
            Some(record) if !record.blocked => record,
            Some(_) => return Err(Error::NotFound(format!("{namespace}/{name}/{system}@{version} is blocked"))),
            None => {
                let identity = Identity::Module {
                    namespace: namespace.clone(),
                    name: name.clone(),
                    system: system.clone(),
                    version: version.clone(),
                };
                match state.coordinator.get_or_fetch(&identity).await? {
                    Outcome::Found(IndexedArtifact::Module(record)) => record,
                    Outcome::Found(IndexedArtifact::Provider(_)) => {
                        return Err(Error::Fatal("coordinator returned a provider for a module identity".into()))
                    }
                    Outcome::NotFound => return Err(Error::NotFound(format!("{namespace}/{name}/{system}@{version}"))),
                    Outcome::Denied(reason) => return Err(Error::Denied(reason)),
                    Outcome::Throttled => return Err(Error::Throttled("auto-download rate limit exceeded".into())),
                }
            }
        };

        download_url(&state, &record).await
    })
    .await?;

    let location = String::from_utf8(bytes).map_err(|err| Error::Fatal(err.to_string()))?;

    let mut headers = HeaderMap::new();
    headers.insert("X-Cache", cache_header_value(status));
    headers.insert("X-Terraform-Get", location.parse().map_err(|_| Error::Fatal("invalid download URL".into()))?);
    Ok((StatusCode::NO_CONTENT, headers))
}

async fn download_url(state: &Arc<AppState>, record: &ModuleRecord) -> Result<Vec<u8>> {
    let presigned = state.storage.presign(&record.storage_key, presign_ttl(state)).await?;
    Ok(presigned.as_download_url(&state.config.server.mirror_hostname).into_bytes())
}

fn cache_header_value(status: CacheStatus) -> axum::http::HeaderValue {
    let value = if status == CacheStatus::Hit { "HIT" } else { "MISS" };
    value.parse().expect("static header value")
}

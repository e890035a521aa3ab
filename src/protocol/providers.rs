//! Provider Network Mirror Protocol endpoints.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use serde::Serialize;

use super::cache_through::{fetch_or_compute, presign_ttl};
use crate::autodownload::Outcome;
use crate::cache::CacheStatus;
use crate::db::{Identity, ProviderRecord};
use crate::ingest::IndexedArtifact;
use crate::state::AppState;
use crate::{Error, Result};

/// Matches the Provider Network Mirror Protocol's versions document exactly:
/// `{"versions": {"<version>": {}}}`, one empty object per known version,
/// duplicates across platforms collapsed (spec §8).
#[derive(Serialize)]
struct VersionsResponse {
    versions: BTreeMap<String, serde_json::Value>,
}

pub async fn versions(
    State(state): State<Arc<AppState>>,
    Path((namespace, provider_type)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    let key = format!("providers:{namespace}/{provider_type}:versions");

    let (status, bytes) = fetch_or_compute(&state, &key, "application/json", || async {
        let rows = state.db.list_provider_versions(&namespace, &provider_type).await?;
        let versions = rows.into_iter().map(|v| (v, serde_json::json!({}))).collect();
        serde_json::to_vec(&VersionsResponse { versions }).map_err(|err| Error::Fatal(err.to_string()))
    })
    .await?;

    Ok(with_cache_header(status, bytes))
}

#[derive(Serialize)]
struct DownloadResponse {
    protocols: Vec<String>,
    os: String,
    arch: String,
    filename: String,
    download_url: String,
    shasum: String,
    shasum_url: String,
    shasum_signature_url: String,
    signing_keys: SigningKeys,
}

#[derive(Serialize)]
struct SigningKeys {
    gpg_public_keys: Vec<serde_json::Value>,
}

pub async fn download(
    State(state): State<Arc<AppState>>,
    Path((namespace, provider_type, version, os, arch)): Path<(String, String, String, String, String)>,
) -> Result<impl IntoResponse> {
    let key = format!("providers:{namespace}/{provider_type}/{version}/{os}/{arch}:download");

    let (status, bytes) = fetch_or_compute(&state, &key, "application/json", || async {
        let record = match state.db.find_provider(&namespace, &provider_type, &version, &os, &arch).await? {
            Some(record) if !record.blocked => record,
            Some(_) => return Err(Error::NotFound(format!("{namespace}/{provider_type}@{version} is blocked"))),
            None => {
                let identity = Identity::Provider {
                    namespace: namespace.clone(),
                    r#type: provider_type.clone(),
                    version: version.clone(),
                    os: os.clone(),
                    arch: arch.clone(),
                };
                match state.coordinator.get_or_fetch(&identity).await? {
                    Outcome::Found(IndexedArtifact::Provider(record)) => record,
                    Outcome::Found(IndexedArtifact::Module(_)) => {
                        return Err(Error::Fatal("coordinator returned a module for a provider identity".into()))
                    }
                    Outcome::NotFound => return Err(Error::NotFound(format!("{namespace}/{provider_type}@{version}"))),
                    Outcome::Denied(reason) => return Err(Error::Denied(reason)),
                    Outcome::Throttled => return Err(Error::Throttled("auto-download rate limit exceeded".into())),
                }
            }
        };

        build_response(&state, &record).await
    })
    .await?;

    Ok(with_cache_header(status, bytes))
}

async fn build_response(state: &Arc<AppState>, record: &ProviderRecord) -> Result<Vec<u8>> {
    let presigned = state.storage.presign(&record.storage_key, presign_ttl(state)).await?;
    let download_url = presigned.as_download_url(&state.config.server.mirror_hostname);

    let response = DownloadResponse {
        protocols: vec!["5.0".to_string()],
        os: record.os.clone(),
        arch: record.arch.clone(),
        filename: record.filename.clone(),
        download_url,
        shasum: record.shasum.clone(),
        shasum_url: String::new(),
        shasum_signature_url: String::new(),
        signing_keys: SigningKeys { gpg_public_keys: Vec::new() },
    };

    serde_json::to_vec(&response).map_err(|err| Error::Fatal(err.to_string()))
}

fn with_cache_header(status: CacheStatus, bytes: Vec<u8>) -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    let value = if status == CacheStatus::Hit { "HIT" } else { "MISS" };
    headers.insert("X-Cache", value.parse().expect("static header value"));
    headers.insert(
        axum::http::header::CONTENT_TYPE,
        "application/json".parse().expect("static header value"),
    );
    (headers, bytes)
}

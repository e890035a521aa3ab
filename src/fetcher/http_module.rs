use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::git::{self, GitSource};
use super::{base_url, with_retry, FetchError, RetryPolicy};

/// Either the module source URL is plain HTTP(S) or it names a git
/// reference (`git::<transport>://...`), per the Module Registry Protocol.
pub enum ModuleSource {
    Http(String),
    Git(GitSource),
}

pub fn classify_source(source_url: &str) -> ModuleSource {
    if let Some(git_source) = git::parse_git_source(source_url) {
        ModuleSource::Git(git_source)
    } else {
        ModuleSource::Http(source_url.to_string())
    }
}

pub struct FetchedModule {
    pub source_url: String,
    /// Always a gzip tarball, regardless of the transport used, so
    /// downstream handling (the Module Rewriter, upload) is uniform.
    pub tarball: Vec<u8>,
}

pub struct HttpModuleFetcher {
    client: Client,
    upstream_registry: String,
    retry_policy: RetryPolicy,
}

impl HttpModuleFetcher {
    pub fn new(upstream_registry: String, retry_policy: RetryPolicy) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .user_agent("tfmirror/0.1.0")
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|err| FetchError::UpstreamIO(err.to_string()))?;

        Ok(Self { client, upstream_registry, retry_policy })
    }

    /// Issues the versions request (used by the protocol layer directly,
    /// not part of fetch) and the download request, which returns the
    /// canonical source URL via `X-Terraform-Get` (per protocol), then
    /// dispatches to the HTTP or git path.
    pub async fn fetch(
        &self,
        namespace: &str,
        name: &str,
        system: &str,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<FetchedModule, FetchError> {
        let source_url = self.resolve_source_url(namespace, name, system, version, cancel).await?;

        match classify_source(&source_url) {
            ModuleSource::Http(url) => {
                let tarball = self.fetch_http_tarball(&url, cancel).await?;
                Ok(FetchedModule { source_url, tarball })
            }
            ModuleSource::Git(git_source) => {
                let tarball = git::fetch_tarball(&git_source, cancel).await?;
                Ok(FetchedModule { source_url, tarball })
            }
        }
    }

    async fn resolve_source_url(
        &self,
        namespace: &str,
        name: &str,
        system: &str,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<String, FetchError> {
        let url = format!(
            "{}/v1/modules/{namespace}/{name}/{system}/{version}/download",
            base_url(&self.upstream_registry)
        );

        with_retry(self.retry_policy, cancel, || {
            let client = &self.client;
            let url = url.clone();
            async move {
                let response = client.get(&url).send().await.map_err(classify_error)?;

                if response.status() == reqwest::StatusCode::NOT_FOUND {
                    return Err(FetchError::NotFound);
                }
                if response.status().is_server_error() {
                    return Err(FetchError::UpstreamIO(format!("HTTP {}", response.status())));
                }

                response
                    .headers()
                    .get("X-Terraform-Get")
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string)
                    .ok_or_else(|| FetchError::UpstreamIO("missing X-Terraform-Get header".to_string()))
            }
        })
        .await
    }

    async fn fetch_http_tarball(&self, url: &str, cancel: &CancellationToken) -> Result<Vec<u8>, FetchError> {
        with_retry(self.retry_policy, cancel, || {
            let client = &self.client;
            async move {
                let response = client.get(url).send().await.map_err(classify_error)?;
                if response.status() == reqwest::StatusCode::NOT_FOUND {
                    return Err(FetchError::NotFound);
                }
                if !response.status().is_success() {
                    return Err(FetchError::UpstreamIO(format!("HTTP {}", response.status())));
                }
                let bytes = response.bytes().await.map_err(|err| FetchError::UpstreamIO(err.to_string()))?;
                Ok(bytes.to_vec())
            }
        })
        .await
    }
}

fn classify_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::UpstreamIO(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_git_sources() {
        assert!(matches!(
            classify_source("git::https://example.com/repo.git?ref=v1.0.0"),
            ModuleSource::Git(_)
        ));
    }

    #[test]
    fn classifies_http_sources() {
        assert!(matches!(classify_source("https://example.com/module.tar.gz"), ModuleSource::Http(_)));
    }
}

use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{base_url, with_retry, FetchError, RetryPolicy};

/// The registry's "download info" response (Provider Network Mirror
/// Protocol, `GET .../{version}/download/{os}/{arch}`).
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadInfo {
    pub filename: String,
    pub download_url: String,
    pub shasum: String,
}

pub struct HttpProviderFetcher {
    client: Client,
    upstream_registry: String,
    retry_policy: RetryPolicy,
}

pub struct FetchedProvider {
    pub filename: String,
    pub download_url: String,
    pub shasum: String,
    pub bytes: Vec<u8>,
}

impl HttpProviderFetcher {
    pub fn new(upstream_registry: String, retry_policy: RetryPolicy) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .user_agent("tfmirror/0.1.0")
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|err| FetchError::UpstreamIO(err.to_string()))?;

        Ok(Self { client, upstream_registry, retry_policy })
    }

    /// Fetches download info, then the blob, verifying its SHA-256 against
    /// the advertised checksum. A checksum mismatch is never retried.
    pub async fn fetch(
        &self,
        namespace: &str,
        provider_type: &str,
        version: &str,
        os: &str,
        arch: &str,
        cancel: &CancellationToken,
    ) -> Result<FetchedProvider, FetchError> {
        let info = self.fetch_download_info(namespace, provider_type, version, os, arch, cancel).await?;
        let bytes = self.fetch_blob(&info.download_url, cancel).await?;

        let actual = hex::encode(Sha256::digest(&bytes));
        if actual != info.shasum {
            return Err(FetchError::ChecksumMismatch { expected: info.shasum, actual });
        }

        Ok(FetchedProvider { filename: info.filename, download_url: info.download_url, shasum: info.shasum, bytes })
    }

    async fn fetch_download_info(
        &self,
        namespace: &str,
        provider_type: &str,
        version: &str,
        os: &str,
        arch: &str,
        cancel: &CancellationToken,
    ) -> Result<DownloadInfo, FetchError> {
        let url = format!(
            "{}/v1/providers/{namespace}/{provider_type}/{version}/download/{os}/{arch}",
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
                if !response.status().is_success() {
                    return Err(FetchError::UpstreamIO(format!("HTTP {}", response.status())));
                }

                response.json::<DownloadInfo>().await.map_err(|err| FetchError::UpstreamIO(err.to_string()))
            }
        })
        .await
    }

    async fn fetch_blob(&self, url: &str, cancel: &CancellationToken) -> Result<Vec<u8>, FetchError> {
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
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn checksum_mismatch_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/providers/hashicorp/random/3.5.1/download/linux/amd64"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "filename": "terraform-provider-random_3.5.1_linux_amd64.zip",
                "download_url": format!("{}/blob.zip", server.uri()),
                "shasum": "a".repeat(64),
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/blob.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"not the right bytes".to_vec()))
            .mount(&server)
            .await;

        let fetcher = HttpProviderFetcher::new(
            server.uri(),
            RetryPolicy { max_attempts: 3, initial_delay: Duration::from_millis(1) },
        )
        .unwrap();

        let cancel = CancellationToken::new();
        let result = fetcher.fetch("hashicorp", "random", "3.5.1", "linux", "amd64", &cancel).await;

        assert!(matches!(result, Err(FetchError::ChecksumMismatch { .. })));
    }

    #[tokio::test]
    async fn matching_checksum_succeeds() {
        let server = MockServer::start().await;
        let body = b"provider binary bytes".to_vec();
        let shasum = hex::encode(Sha256::digest(&body));

        Mock::given(method("GET"))
            .and(path("/v1/providers/hashicorp/random/3.5.1/download/linux/amd64"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "filename": "terraform-provider-random_3.5.1_linux_amd64.zip",
                "download_url": format!("{}/blob.zip", server.uri()),
                "shasum": shasum,
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/blob.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let fetcher = HttpProviderFetcher::new(
            server.uri(),
            RetryPolicy { max_attempts: 3, initial_delay: Duration::from_millis(1) },
        )
        .unwrap();

        let cancel = CancellationToken::new();
        let fetched = fetcher.fetch("hashicorp", "random", "3.5.1", "linux", "amd64", &cancel).await.unwrap();
        assert_eq!(fetched.bytes, body);
    }

    #[tokio::test]
    async fn missing_version_returns_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/providers/hashicorp/random/9.9.9/download/linux/amd64"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpProviderFetcher::new(
            server.uri(),
            RetryPolicy { max_attempts: 3, initial_delay: Duration::from_millis(1) },
        )
        .unwrap();

        let cancel = CancellationToken::new();
        let result = fetcher.fetch("hashicorp", "random", "9.9.9", "linux", "amd64", &cancel).await;
        assert!(matches!(result, Err(FetchError::NotFound)));
    }

    #[test]
    fn retry_policy_doubles_each_attempt() {
        let policy = RetryPolicy { max_attempts: 4, initial_delay: Duration::from_millis(100) };
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
    }
}

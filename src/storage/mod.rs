//! Object storage abstraction for provider and module artifacts
//! (spec §4.1), built on the Apache Arrow `object_store` crate.

pub mod keys;
pub mod presign;

use bytes::Bytes;
use futures::stream::BoxStream;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as StoragePath;
use object_store::{ObjectMeta, ObjectStore as ObjectStoreTrait, PutPayload};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{StorageConfig, StorageProvider};
use crate::{Error, Result};
pub use presign::PresignedUrl;

/// Metadata returned after a successful upload.
#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub key: String,
    pub etag: Option<String>,
    pub size: usize,
}

/// Uniform object-store handle: a thin wrapper around `Arc<dyn ObjectStore>`
/// plus the bucket/backend identity needed for presigning.
#[derive(Clone)]
pub struct Storage {
    store: Arc<dyn ObjectStoreTrait>,
    backend: Backend,
}

#[derive(Clone)]
enum Backend {
    S3 {
        presigner: Arc<presign::S3Presigner>,
    },
    Local,
    Memory,
}

impl Storage {
    /// Build a storage adapter from configuration, selecting the backend
    /// named in `storage.type`.
    pub async fn from_config(config: &StorageConfig) -> Result<Self> {
        match config.r#type {
            StorageProvider::S3 => {
                let mut builder = AmazonS3Builder::new()
                    .with_bucket_name(&config.bucket)
                    .with_virtual_hosted_style_request(!config.force_path_style);

                if let Some(region) = &config.region {
                    builder = builder.with_region(region);
                }
                if let Some(endpoint) = &config.endpoint {
                    builder = builder.with_endpoint(endpoint);
                }
                if let (Some(access_key), Some(secret_key)) =
                    (&config.access_key, &config.secret_key)
                {
                    builder = builder
                        .with_access_key_id(access_key)
                        .with_secret_access_key(secret_key);
                }

                let store = builder.build().map_err(|err| Error::Fatal(err.to_string()))?;

                let aws_config = aws_config::load_from_env().await;
                let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&aws_config)
                    .force_path_style(config.force_path_style);
                if let Some(endpoint) = &config.endpoint {
                    s3_config_builder = s3_config_builder.endpoint_url(endpoint);
                }
                let client = aws_sdk_s3::Client::from_conf(s3_config_builder.build());
                let presigner = presign::S3Presigner::new(client, config.bucket.clone());

                Ok(Self {
                    store: Arc::new(store),
                    backend: Backend::S3 {
                        presigner: Arc::new(presigner),
                    },
                })
            }
            StorageProvider::Local => {
                std::fs::create_dir_all(&config.local_path)
                    .map_err(|err| Error::StorageIO(err.to_string()))?;
                let store = LocalFileSystem::new_with_prefix(&config.local_path)
                    .map_err(|err| Error::StorageIO(err.to_string()))?;
                Ok(Self {
                    store: Arc::new(store),
                    backend: Backend::Local,
                })
            }
        }
    }

    /// In-memory storage for tests.
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(InMemory::new()),
            backend: Backend::Memory,
        }
    }

    pub async fn upload(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<UploadMetadata> {
        let path = StoragePath::from(key);
        let size = data.len();

        let payload = PutPayload::from_bytes(Bytes::from(data));
        let mut opts = object_store::PutOptions::default();
        opts.attributes
            .insert(object_store::Attribute::ContentType, content_type.to_string().into());

        let put_result = self
            .store
            .put_opts(&path, payload, opts)
            .await
            .map_err(|err| Error::UpstreamIO(err.to_string()))?;

        tracing::info!(key, size, "uploaded artifact to object store");

        Ok(UploadMetadata {
            key: key.to_string(),
            etag: put_result.e_tag,
            size,
        })
    }

    pub async fn download(&self, key: &str) -> Result<Vec<u8>> {
        let path = StoragePath::from(key);
        let result = self.store.get(&path).await?;
        let bytes = result.bytes().await?;
        tracing::debug!(key, size = bytes.len(), "downloaded object");
        Ok(bytes.to_vec())
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        let path = StoragePath::from(key);
        self.store.delete(&path).await?;
        Ok(())
    }

    /// Distinguishes "absent" from any other error, per spec §4.1.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let path = StoragePath::from(key);
        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn size(&self, key: &str) -> Result<u64> {
        let path = StoragePath::from(key);
        let meta = self.store.head(&path).await?;
        Ok(meta.size as u64)
    }

    pub async fn metadata(&self, key: &str) -> Result<ObjectMeta> {
        let path = StoragePath::from(key);
        Ok(self.store.head(&path).await?)
    }

    pub fn list_by_prefix<'a>(&'a self, prefix: &str) -> BoxStream<'a, Result<ObjectMeta>> {
        use futures::StreamExt;
        let path = StoragePath::from(prefix);
        Box::pin(self.store.list(Some(&path)).map(|item| item.map_err(Error::from)))
    }

    /// Mint a time-bounded URL for `key`. Validity is at least `ttl`.
    pub async fn presign(&self, key: &str, ttl: Duration) -> Result<PresignedUrl> {
        match &self.backend {
            Backend::S3 { presigner } => presigner.presign_get(key, ttl).await,
            Backend::Local | Backend::Memory => Ok(PresignedUrl::Local(key.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_download_roundtrip() {
        let storage = Storage::in_memory();
        storage
            .upload("providers/x", b"hello".to_vec(), "application/zip")
            .await
            .unwrap();

        let bytes = storage.download("providers/x").await.unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn exists_distinguishes_absent_from_present() {
        let storage = Storage::in_memory();
        assert!(!storage.exists("missing").await.unwrap());

        storage.upload("present", b"x".to_vec(), "text/plain").await.unwrap();
        assert!(storage.exists("present").await.unwrap());
    }

    #[tokio::test]
    async fn delete_removes_the_object() {
        let storage = Storage::in_memory();
        storage.upload("k", b"v".to_vec(), "text/plain").await.unwrap();
        storage.delete("k").await.unwrap();
        assert!(!storage.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn local_and_memory_backends_presign_as_local() {
        let storage = Storage::in_memory();
        storage.upload("k", b"v".to_vec(), "text/plain").await.unwrap();
        let presigned = storage.presign("k", Duration::from_secs(60)).await.unwrap();
        assert!(matches!(presigned, PresignedUrl::Local(_)));
    }
}

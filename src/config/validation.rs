use super::models::{Config, StorageProvider};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("storage provider is s3 but missing credentials (access_key or secret_key)")]
    MissingS3Credentials,

    #[error("storage.bucket must not be empty")]
    EmptyBucket,

    #[error("processor.max_concurrent_jobs must be greater than zero")]
    InvalidMaxConcurrentJobs,

    #[error("processor.polling_interval_seconds must be greater than zero")]
    InvalidPollingInterval,

    #[error("processor.stuck_item_grace_seconds must be greater than zero")]
    InvalidStuckItemGrace,

    #[error("auto_download.max_concurrent_downloads must be greater than zero")]
    InvalidMaxConcurrentDownloads,

    #[error("auto_download.rate_limit_per_minute must be greater than zero")]
    InvalidRateLimit,

    #[error("namespace '{namespace}' appears in both allowed_namespaces and blocked_namespaces")]
    ConflictingNamespaceRule { namespace: String },

    #[error("database.max_connections must be greater than zero")]
    InvalidMaxConnections,

    #[error("cache.ttl_seconds must be greater than zero")]
    InvalidCacheTtl,
}

/// Validate the entire configuration; cheap, synchronous, cross-field checks
/// that `serde` defaults alone can't express.
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_storage(config)?;
    validate_database(config)?;
    validate_cache(config)?;
    validate_processor(config)?;
    validate_auto_download(config)?;
    Ok(())
}

fn validate_storage(config: &Config) -> Result<(), ValidationError> {
    if config.storage.bucket.trim().is_empty() {
        return Err(ValidationError::EmptyBucket);
    }

    if config.storage.r#type == StorageProvider::S3
        && (config.storage.access_key.is_none() || config.storage.secret_key.is_none())
    {
        return Err(ValidationError::MissingS3Credentials);
    }

    Ok(())
}

fn validate_database(config: &Config) -> Result<(), ValidationError> {
    if config.database.max_connections == 0 {
        return Err(ValidationError::InvalidMaxConnections);
    }
    Ok(())
}

fn validate_cache(config: &Config) -> Result<(), ValidationError> {
    if config.cache.ttl_seconds == 0 {
        return Err(ValidationError::InvalidCacheTtl);
    }
    Ok(())
}

fn validate_processor(config: &Config) -> Result<(), ValidationError> {
    if config.processor.max_concurrent_jobs == 0 {
        return Err(ValidationError::InvalidMaxConcurrentJobs);
    }
    if config.processor.polling_interval_seconds == 0 {
        return Err(ValidationError::InvalidPollingInterval);
    }
    if config.processor.stuck_item_grace_seconds == 0 {
        return Err(ValidationError::InvalidStuckItemGrace);
    }
    Ok(())
}

fn validate_auto_download(config: &Config) -> Result<(), ValidationError> {
    let auto_download = &config.auto_download;

    if auto_download.max_concurrent_downloads == 0 {
        return Err(ValidationError::InvalidMaxConcurrentDownloads);
    }
    if auto_download.rate_limit_per_minute == 0 {
        return Err(ValidationError::InvalidRateLimit);
    }

    for namespace in &auto_download.allowed_namespaces {
        if auto_download.blocked_namespaces.contains(namespace) {
            return Err(ValidationError::ConflictingNamespaceRule {
                namespace: namespace.clone(),
            });
        }
    }

    Ok(())
}

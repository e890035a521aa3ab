use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration (spec §3 "Configuration", §6 recognized keys).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub processor: ProcessorConfig,
    #[serde(default)]
    pub auto_download: AutoDownloadConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub tls_cert_path: Option<PathBuf>,
    #[serde(default)]
    pub tls_key_path: Option<PathBuf>,
    /// Hostname the mirror advertises; used by the Module Rewriter and the
    /// download endpoints to build mirror-relative URLs.
    #[serde(default = "default_mirror_hostname")]
    pub mirror_hostname: String,
    #[serde(default = "default_upstream_registry")]
    pub upstream_registry: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            tls_cert_path: None,
            tls_key_path: None,
            mirror_hostname: default_mirror_hostname(),
            upstream_registry: default_upstream_registry(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_mirror_hostname() -> String {
    "localhost:8080".to_string()
}

fn default_upstream_registry() -> String {
    "registry.terraform.io".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    S3,
    Local,
}

impl Default for StorageProvider {
    fn default() -> Self {
        StorageProvider::Local
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub r#type: StorageProvider,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    /// Loaded from the environment, never from the TOML file.
    #[serde(skip)]
    pub access_key: Option<String>,
    #[serde(skip)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
    #[serde(default = "default_local_path")]
    pub local_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            r#type: StorageProvider::default(),
            bucket: default_bucket(),
            region: None,
            endpoint: None,
            access_key: None,
            secret_key: None,
            force_path_style: false,
            local_path: default_local_path(),
        }
    }
}

fn default_bucket() -> String {
    "tfmirror".to_string()
}

fn default_local_path() -> PathBuf {
    PathBuf::from("data/objects")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub backup_enabled: bool,
    #[serde(default = "default_backup_interval_hours")]
    pub backup_interval_hours: u32,
    #[serde(default)]
    pub backup_prefix: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            backup_enabled: false,
            backup_interval_hours: default_backup_interval_hours(),
            backup_prefix: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/tfmirror.db")
}

fn default_backup_interval_hours() -> u32 {
    24
}

fn default_max_connections() -> u32 {
    8
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_memory_size_mb")]
    pub memory_size_mb: ByteSize,
    #[serde(default = "default_disk_path")]
    pub disk_path: PathBuf,
    #[serde(default = "default_disk_size_gb")]
    pub disk_size_gb: ByteSize,
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_size_mb: default_memory_size_mb(),
            disk_path: default_disk_path(),
            disk_size_gb: default_disk_size_gb(),
            ttl_seconds: default_ttl_seconds(),
        }
    }
}

fn default_memory_size_mb() -> ByteSize {
    ByteSize(64 * 1024 * 1024)
}

fn default_disk_path() -> PathBuf {
    PathBuf::from("data/cache")
}

fn default_disk_size_gb() -> ByteSize {
    ByteSize(1024 * 1024 * 1024)
}

fn default_ttl_seconds() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(skip)]
    pub jwt_secret: Option<String>,
    #[serde(default = "default_jwt_expiration_hours")]
    pub jwt_expiration_hours: u32,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            jwt_expiration_hours: default_jwt_expiration_hours(),
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

fn default_jwt_expiration_hours() -> u32 {
    24
}

fn default_bcrypt_cost() -> u32 {
    12
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessorConfig {
    #[serde(default = "default_polling_interval_seconds")]
    pub polling_interval_seconds: u64,
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: u64,
    #[serde(default = "default_worker_shutdown_seconds")]
    pub worker_shutdown_seconds: u64,
    /// How old a `downloading` item must be, with no progress, before the
    /// next poll reclaims it back to `pending` (spec §9 open question).
    #[serde(default = "default_stuck_item_grace_seconds")]
    pub stuck_item_grace_seconds: u64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            polling_interval_seconds: default_polling_interval_seconds(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            retry_attempts: default_retry_attempts(),
            retry_delay_seconds: default_retry_delay_seconds(),
            worker_shutdown_seconds: default_worker_shutdown_seconds(),
            stuck_item_grace_seconds: default_stuck_item_grace_seconds(),
        }
    }
}

fn default_polling_interval_seconds() -> u64 {
    5
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_seconds() -> u64 {
    2
}

fn default_worker_shutdown_seconds() -> u64 {
    30
}

fn default_stuck_item_grace_seconds() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AutoDownloadConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub allowed_namespaces: Vec<String>,
    #[serde(default)]
    pub blocked_namespaces: Vec<String>,
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,
    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: usize,
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_true")]
    pub cache_negative_results: bool,
    #[serde(default = "default_negative_cache_ttl_seconds")]
    pub negative_cache_ttl_seconds: u64,
}

impl Default for AutoDownloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_namespaces: Vec::new(),
            blocked_namespaces: Vec::new(),
            rate_limit_per_minute: default_rate_limit_per_minute(),
            max_concurrent_downloads: default_max_concurrent_downloads(),
            queue_size: default_queue_size(),
            timeout_seconds: default_timeout_seconds(),
            cache_negative_results: true,
            negative_cache_ttl_seconds: default_negative_cache_ttl_seconds(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_rate_limit_per_minute() -> u32 {
    60
}

fn default_max_concurrent_downloads() -> usize {
    8
}

fn default_queue_size() -> usize {
    64
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_negative_cache_ttl_seconds() -> u64 {
    300
}

pub fn bind_addr(cfg: &ServerConfig) -> SocketAddr {
    format!("0.0.0.0:{}", cfg.port)
        .parse()
        .expect("static format string always parses")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let config = Config {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            database: DatabaseConfig::default(),
            cache: CacheConfig::default(),
            auth: AuthConfig::default(),
            processor: ProcessorConfig::default(),
            auto_download: AutoDownloadConfig::default(),
        };

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.processor.max_concurrent_jobs, 4);
        assert!(config.auto_download.enabled);
    }
}

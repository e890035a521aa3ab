//! Layered configuration loading.
//!
//! Settings are assembled from, in increasing priority:
//! 1. Default values embedded in the structs below
//! 2. A TOML file (default `config/tfmirror.toml`, overridable via `TFM_CONFIG`)
//! 3. A `.env` file (via dotenvy)
//! 4. Process environment variables (`TFM__<SECTION>__<KEY>`, highest priority)
//!
//! Secrets (`TFM_S3_ACCESS_KEY`, `TFM_S3_SECRET_KEY`, `TFM_JWT_SECRET`) are
//! never read from the TOML file, only from the environment.
//!
//! # Example
//!
//! ```no_run
//! use tfmirror::config::Config;
//!
//! let config = Config::load().expect("failed to load configuration");
//! println!("listening on port {}", config.server.port);
//! ```

mod models;
mod sources;
mod validation;

pub use models::{
    bind_addr, AuthConfig, AutoDownloadConfig, CacheConfig, Config, DatabaseConfig,
    ProcessorConfig, ServerConfig, StorageConfig, StorageProvider,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("configuration validation failed: {0}")]
    Validation(#[from] ValidationError),
}

impl From<ConfigError> for crate::Error {
    fn from(err: ConfigError) -> Self {
        crate::Error::Fatal(err.to_string())
    }
}

impl Config {
    /// Load configuration from all sources (defaults, file, env).
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific TOML path, skipping the
    /// `TFM_CONFIG`-driven default path resolution. Used by tests and by
    /// the `--config` CLI flag.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn loads_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(
            &config_path,
            r#"
[server]
port = 9001
"#,
        )
        .unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.server.port, 9001);
    }

    #[test]
    fn validation_rejects_bad_s3_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(
            &config_path,
            r#"
[storage]
type = "s3"
bucket = "tfmirror"
"#,
        )
        .unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result,
            Err(ConfigError::Validation(ValidationError::MissingS3Credentials))
        ));
    }
}

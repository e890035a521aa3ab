use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "TFM_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/tfmirror.toml";
const ENV_PREFIX: &str = "TFM";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from a `.env` file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = load_from_sources(config_path)?;
    load_secrets(&mut config);
    Ok(config)
}

/// Secrets never live in the TOML file, only in the environment.
fn load_secrets(config: &mut Config) {
    if let Ok(access_key) = env::var("TFM_S3_ACCESS_KEY") {
        config.storage.access_key = Some(access_key);
    }
    if let Ok(secret_key) = env::var("TFM_S3_SECRET_KEY") {
        config.storage.secret_key = Some(secret_key);
    }

    if config.storage.access_key.is_none() {
        if let Ok(access_key) = env::var("AWS_ACCESS_KEY_ID") {
            config.storage.access_key = Some(access_key);
        }
    }
    if config.storage.secret_key.is_none() {
        if let Ok(secret_key) = env::var("AWS_SECRET_ACCESS_KEY") {
            config.storage.secret_key = Some(secret_key);
        }
    }

    if let Ok(jwt_secret) = env::var("TFM_JWT_SECRET") {
        config.auth.jwt_secret = Some(jwt_secret);
    }
}

/// Load configuration from a specific path. Useful for tests that want a
/// custom config file without touching the environment-driven default path.
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!(path = %config_path.display(), "loading configuration file");
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::debug!(
            path = %config_path.display(),
            "no configuration file found, using defaults and environment overrides"
        );
    }

    // TFM__SERVER__PORT -> server.port, TFM__AUTO_DOWNLOAD__ENABLED -> auto_download.enabled
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

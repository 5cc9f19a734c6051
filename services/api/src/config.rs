//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where topic PDFs are kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageSettings {
    S3 {
        bucket: String,
        region: String,
        access_key_id: String,
        secret_access_key: String,
        endpoint: Option<String>,
    },
    Local {
        path: PathBuf,
    },
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub storage: StorageSettings,
    pub cors_origin: String,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required = |key: &str| lookup(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()));

        // --- Load Server and Database Settings ---
        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = required("DATABASE_URL")?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Object Storage Settings ---
        let storage = match var_or("STORAGE_PROVIDER", "s3").to_lowercase().as_str() {
            "s3" => StorageSettings::S3 {
                bucket: var_or("S3_BUCKET", "quiz-app-doctor"),
                region: var_or("AWS_REGION", "us-east-1"),
                access_key_id: required("AWS_ACCESS_KEY_ID")?,
                secret_access_key: required("AWS_SECRET_ACCESS_KEY")?,
                endpoint: lookup("S3_ENDPOINT"),
            },
            "local" => StorageSettings::Local {
                path: PathBuf::from(var_or("LOCAL_STORAGE_PATH", "./storage")),
            },
            other => {
                return Err(ConfigError::InvalidValue(
                    "STORAGE_PROVIDER".to_string(),
                    format!("'{}' is not one of s3, local", other),
                ))
            }
        };

        let cors_origin = var_or("CORS_ORIGIN", "http://localhost:3000");

        let max_upload_str = var_or("MAX_UPLOAD_BYTES", "10485760");
        let max_upload_bytes = max_upload_str.parse::<usize>().map_err(|e| {
            ConfigError::InvalidValue("MAX_UPLOAD_BYTES".to_string(), e.to_string())
        })?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            storage,
            cors_origin,
            max_upload_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_for_local_storage() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/learning"),
            ("STORAGE_PROVIDER", "local"),
        ])
        .unwrap();
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(
            config.storage,
            StorageSettings::Local {
                path: PathBuf::from("./storage")
            }
        );
    }

    #[test]
    fn database_url_is_required() {
        let err = load(&[("STORAGE_PROVIDER", "local")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(v) if v == "DATABASE_URL"));
    }

    #[test]
    fn s3_requires_credentials() {
        let err = load(&[("DATABASE_URL", "postgres://localhost/learning")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(v) if v == "AWS_ACCESS_KEY_ID"));
    }

    #[test]
    fn s3_settings_use_default_bucket() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/learning"),
            ("AWS_ACCESS_KEY_ID", "key"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("S3_ENDPOINT", "http://minio:9000"),
        ])
        .unwrap();
        match config.storage {
            StorageSettings::S3 { bucket, region, endpoint, .. } => {
                assert_eq!(bucket, "quiz-app-doctor");
                assert_eq!(region, "us-east-1");
                assert_eq!(endpoint.as_deref(), Some("http://minio:9000"));
            }
            other => panic!("unexpected storage settings: {:?}", other),
        }
    }

    #[test]
    fn unknown_provider_and_bad_values_are_rejected() {
        assert!(matches!(
            load(&[("DATABASE_URL", "x"), ("STORAGE_PROVIDER", "ftp")]),
            Err(ConfigError::InvalidValue(..))
        ));
        assert!(matches!(
            load(&[("DATABASE_URL", "x"), ("STORAGE_PROVIDER", "local"), ("RUST_LOG", "loud")]),
            Err(ConfigError::InvalidValue(..))
        ));
        assert!(matches!(
            load(&[("DATABASE_URL", "x"), ("STORAGE_PROVIDER", "local"), ("BIND_ADDRESS", "nowhere")]),
            Err(ConfigError::InvalidValue(..))
        ));
    }
}

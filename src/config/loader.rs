//! Configuration loading from disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::config::schema::{AppConfig, CONFIG_FILE_NAME};
use crate::config::validation::{validate_config, ValidationError};
use crate::yaml::{FileCache, FileKind, LoadError, LoaderOptions, SecretMode, YamlLoader};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: LoadError,
    },

    #[error("invalid configuration in {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parses `scs-configuration.yaml` in `config_dir` without validating it.
///
/// `!scs-expand-env` is available in the file. Relative paths are made
/// absolute against `config_dir`.
pub fn read_config(config_dir: &Path) -> Result<AppConfig, ConfigError> {
    let path = config_dir.join(CONFIG_FILE_NAME);
    let loader = YamlLoader::new(
        LoaderOptions {
            common_dir: config_dir.to_path_buf(),
            secrets_dir: None,
            reject_dotted_keys: false,
            secret_mode: SecretMode::Resolve,
        },
        Arc::new(FileCache::new(false)),
    );
    let loaded = loader
        .load(&path, FileKind::AppConfig)
        .map_err(|source| ConfigError::Load {
            path: path.clone(),
            source,
        })?;

    let json = match loaded.value.to_json() {
        serde_json::Value::Null => serde_json::Value::Object(Default::default()),
        json => json,
    };
    let mut config: AppConfig =
        serde_json::from_value(json).map_err(|e| ConfigError::Parse {
            path: path.clone(),
            reason: e.to_string(),
        })?;
    config.resolve_paths(config_dir);
    Ok(config)
}

/// Loads and validates the configuration in `config_dir`.
pub fn load_config(config_dir: &Path) -> Result<AppConfig, ConfigError> {
    let config = read_config(config_dir)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

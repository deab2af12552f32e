//! Env file discovery and merging.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::yaml::{FileKind, Mapping, Value, YamlLoader};

use super::schema::{validate_env_file, Environment};
use super::EnvError;

/// File name of a directory-level env file.
pub const ENV_FILE_NAME: &str = "scs-env.yaml";
/// Suffix of a path-specific env file (`<endpoint>.scs-env.yaml`).
pub const ENV_FILE_SUFFIX: &str = ".scs-env.yaml";

/// Returns the env files that apply to `relative_path`, in merge order.
///
/// For `a/b/c.yml` this is `scs-env.yaml`, `a/scs-env.yaml`,
/// `a/b/scs-env.yaml` and `a/b/c.yml.scs-env.yaml`, all relative to the
/// config directory.
pub fn env_file_hierarchy(relative_path: &str) -> Vec<PathBuf> {
    let relative_path = relative_path.trim_start_matches('/');
    let parts: Vec<&str> = relative_path.split('/').filter(|p| !p.is_empty()).collect();

    let mut files = vec![PathBuf::from(ENV_FILE_NAME)];
    let mut prefix = PathBuf::new();
    for part in parts.iter().take(parts.len().saturating_sub(1)) {
        prefix.push(part);
        files.push(prefix.join(ENV_FILE_NAME));
    }
    files.push(PathBuf::from(format!("{relative_path}{ENV_FILE_SUFFIX}")));
    files
}

/// Resolves the merged [`Environment`] of an endpoint.
#[derive(Debug, Clone)]
pub struct EnvironmentResolver {
    config_dir: PathBuf,
    loader: Arc<YamlLoader>,
}

impl EnvironmentResolver {
    pub fn new(config_dir: impl Into<PathBuf>, loader: Arc<YamlLoader>) -> Self {
        Self {
            config_dir: config_dir.into(),
            loader,
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn loader(&self) -> &Arc<YamlLoader> {
        &self.loader
    }

    /// Loads and merges every env file that applies to `relative_path`.
    pub fn resolve(&self, relative_path: &str) -> Result<Environment, EnvError> {
        let mut environment = Environment::defaults();
        for env_file in env_file_hierarchy(relative_path) {
            if let Some(overrides) = self.load_env_file(&env_file)? {
                environment.merge(overrides);
            }
        }
        Ok(environment)
    }

    fn load_env_file(&self, relative: &Path) -> Result<Option<Mapping>, EnvError> {
        let path = self.config_dir.join(relative);
        if !path.is_file() {
            return Ok(None);
        }

        let loaded = self
            .loader
            .load(&path, FileKind::Environment)
            .map_err(|source| {
                if source.is_syntax() {
                    EnvError::Syntax {
                        path: path.clone(),
                        source,
                    }
                } else {
                    EnvError::Reference {
                        path: path.clone(),
                        source,
                    }
                }
            })?;

        let data = match loaded.value {
            Value::Null => Mapping::new(),
            Value::Mapping(map) => map,
            other => {
                return Err(EnvError::Format {
                    path,
                    reason: format!("expected a mapping, got a {}", other.kind()),
                })
            }
        };

        let json = Value::Mapping(data.clone()).to_json();
        validate_env_file(&json).map_err(|errors| EnvError::Format {
            path: path.clone(),
            reason: errors.join("; "),
        })?;

        // Sections are merged key by key, so each one must be written out
        // as a mapping. A referenced section (e.g. `!scs-secret`) is not.
        if let Some((name, section)) = data
            .iter()
            .find(|(_, section)| !matches!(section, Value::Mapping(_)))
        {
            return Err(EnvError::Format {
                path,
                reason: format!("section {name} must be a mapping, got a {}", section.kind()),
            });
        }

        tracing::trace!(path = %path.display(), "Env file loaded");
        Ok(Some(data))
    }
}

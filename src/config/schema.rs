//! Configuration schema definitions.
//!
//! This module defines the structure of `scs-configuration.yaml`. All
//! sections have defaults, so an empty file is a valid configuration apart
//! from the network whitelist.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::templates::RenderingOptions;

/// Name of the configuration file inside the config directory.
pub const CONFIG_FILE_NAME: &str = "scs-configuration.yaml";

/// Root configuration of the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Locations of configs, common files and secrets.
    pub directories: DirectoriesConfig,

    /// Env file loading and caching.
    pub environments: EnvironmentsConfig,

    /// Template rendering.
    pub templates: TemplatesConfig,

    pub logs: LogsConfig,

    /// Users file, network whitelist and auth rate limiting.
    pub auth: AuthConfig,

    /// HTTP listener settings.
    pub server: ServerConfig,

    pub metrics: MetricsConfig,
}

impl AppConfig {
    /// Makes every relative path absolute against `base`, the directory
    /// that contains the configuration file.
    pub fn resolve_paths(&mut self, base: &Path) {
        let absolutize = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        absolutize(&mut self.directories.config);
        absolutize(&mut self.directories.common);
        if let Some(secrets) = self.directories.secrets.as_mut() {
            absolutize(secrets);
        }
        absolutize(&mut self.auth.users_file);
        if let Some(path) = self.logs.audit.path.as_mut() {
            absolutize(path);
        }
        if let Some(tls) = self.server.tls.as_mut() {
            absolutize(&mut tls.cert_path);
            absolutize(&mut tls.key_path);
        }
    }
}

/// Directory layout. Relative paths are relative to the config directory.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DirectoriesConfig {
    /// Root of the served endpoints and their env files.
    pub config: PathBuf,

    /// Base of `!scs-common` references.
    pub common: PathBuf,

    /// Base of `!scs-secret` references. Secrets are disabled when unset.
    pub secrets: Option<PathBuf>,
}

impl Default for DirectoriesConfig {
    fn default() -> Self {
        Self {
            config: PathBuf::from("config"),
            common: PathBuf::from("common"),
            secrets: Some(PathBuf::from("secrets")),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentsConfig {
    /// Cache parsed YAML files for the lifetime of the process.
    pub cache: bool,

    /// Clear the caches whenever a file under the served directories changes.
    pub watch: bool,

    /// Reject referenced files whose keys contain dots.
    pub reject_keys_containing_dots: bool,
}

impl Default for EnvironmentsConfig {
    fn default() -> Self {
        Self {
            cache: true,
            watch: false,
            reject_keys_containing_dots: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplatesConfig {
    /// Reuse compiled templates between requests.
    pub cache: bool,

    /// Render every template once during startup.
    pub validate_on_startup: bool,

    /// Defaults, overridable per endpoint.
    pub rendering_options: RenderingOptions,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            cache: true,
            validate_on_startup: true,
            rendering_options: RenderingOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct LogsConfig {
    pub application: ApplicationLogConfig,
    pub audit: AuditLogConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApplicationLogConfig {
    /// Level filter (trace, debug, info, warn, error). `RUST_LOG` wins.
    pub level: String,

    pub format: LogFormat,
}

impl Default for ApplicationLogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditLogConfig {
    pub enabled: bool,

    /// File to append audit events to. Stdout when unset.
    pub path: Option<PathBuf>,
}

impl Default for AuditLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    pub users_file: PathBuf,

    pub networks: NetworksConfig,

    /// Failed authentications per IP before it is rate limited.
    pub max_auth_fails_per_window: u32,

    /// Length of a rate-limit window.
    pub window_minutes: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            users_file: PathBuf::from("scs-users.yaml"),
            networks: NetworksConfig::default(),
            max_auth_fails_per_window: 10,
            window_minutes: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct NetworksConfig {
    /// Only accept private ranges in any whitelist.
    pub private_only: bool,

    /// Global whitelist; every user whitelist must be inside it.
    pub whitelist: Vec<String>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Number of reverse proxies in front of the server. The client address
    /// is taken from `X-Forwarded-For` accordingly.
    pub reverse_proxy_count: usize,

    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            reverse_proxy_count: 0,
            request_timeout_secs: 30,
            max_body_size: 1024 * 1024,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: PathBuf,

    /// Path to private key file (PEM).
    pub key_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    /// Serve Prometheus metrics.
    pub enabled: bool,

    pub bind_address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.environments.cache);
        assert_eq!(config.auth.max_auth_fails_per_window, 10);
        assert_eq!(config.auth.window_minutes, 15);
        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
        assert_eq!(config.logs.application.format, LogFormat::Pretty);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(serde_yaml::from_str::<AppConfig>("unknown: 1").is_err());
        assert!(serde_yaml::from_str::<AppConfig>("auth: {max_fails: 1}").is_err());
    }

    #[test]
    fn test_resolve_paths() {
        let mut config: AppConfig = serde_yaml::from_str(
            "directories: {config: /srv/configs}\nauth: {users_file: users.yaml}",
        )
        .unwrap();
        config.resolve_paths(Path::new("/etc/scs"));
        assert_eq!(config.directories.config, PathBuf::from("/srv/configs"));
        assert_eq!(config.directories.common, PathBuf::from("/etc/scs/common"));
        assert_eq!(config.auth.users_file, PathBuf::from("/etc/scs/users.yaml"));
    }
}

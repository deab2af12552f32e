//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the shared [`ServerContext`] from a validated [`AppConfig`]
//! - Check every endpoint before traffic is accepted
//! - Start the cache-invalidation watcher
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The endpoint pass doubles as cache warm-up
//! - `validate` runs the same pass with secret placeholders, so it never
//!   needs the secrets directory

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use notify::RecommendedWatcher;
use thiserror::Error;

use crate::config::{AppConfig, CacheWatcher, ConfigError};
use crate::environment::{compile_schema, list_endpoints, EnvError, EnvironmentResolver};
use crate::http::ServerContext;
use crate::observability::logging::LoggingError;
use crate::security::access_control::load_users;
use crate::security::{AccessControl, AccessControlError, NetworkWhitelist, PathPattern};
use crate::templates::{MiniJinjaRenderer, TemplateRenderError, TemplateRenderer};
use crate::yaml::{FileCache, LoaderOptions, SecretMode, YamlLoader};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("access control: {0}")]
    AccessControl(#[from] AccessControlError),

    #[error("failed to list endpoints in {}: {source}", dir.display())]
    Endpoints {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("endpoint {endpoint}: {source}")]
    Environment {
        endpoint: String,
        #[source]
        source: EnvError,
    },

    #[error("endpoint {endpoint}: invalid request schema: {reason}")]
    Schema { endpoint: String, reason: String },

    #[error("endpoint {endpoint}: {source}")]
    Template {
        endpoint: String,
        #[source]
        source: TemplateRenderError,
    },

    #[error("failed to start file watcher: {0}")]
    Watcher(#[from] notify::Error),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error("failed to start metrics exporter: {0}")]
    Metrics(String),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("server error: {0}")]
    Server(#[from] io::Error),
}

/// Creates the YAML loader for the configured directories.
pub fn build_loader(config: &AppConfig, secret_mode: SecretMode) -> Arc<YamlLoader> {
    let cache = Arc::new(FileCache::new(config.environments.cache));
    let options = LoaderOptions {
        common_dir: config.directories.common.clone(),
        secrets_dir: config.directories.secrets.clone(),
        reject_dotted_keys: config.environments.reject_keys_containing_dots,
        secret_mode,
    };
    Arc::new(YamlLoader::new(options, cache))
}

fn build_renderer(config: &AppConfig) -> Arc<dyn TemplateRenderer> {
    Arc::new(MiniJinjaRenderer::new(
        config.directories.config.clone(),
        config.templates.rendering_options,
        config.templates.cache,
    ))
}

/// Builds the context shared by all request handlers.
pub fn build_context(config: AppConfig) -> Result<ServerContext, StartupError> {
    let loader = build_loader(&config, SecretMode::Resolve);
    let access = AccessControl::from_config(&config.auth, &loader)?;
    let resolver = EnvironmentResolver::new(config.directories.config.clone(), loader);
    let renderer = build_renderer(&config);
    Ok(ServerContext::new(config, resolver, access, renderer))
}

/// Resolves every endpoint's environment and compiles its request schema.
/// With `render`, templated endpoints are rendered as well.
///
/// Returns the number of endpoints checked.
pub fn check_endpoints(
    resolver: &EnvironmentResolver,
    renderer: &dyn TemplateRenderer,
    render: bool,
) -> Result<usize, StartupError> {
    let endpoints =
        list_endpoints(resolver.config_dir()).map_err(|source| StartupError::Endpoints {
            dir: resolver.config_dir().to_path_buf(),
            source,
        })?;

    for endpoint in &endpoints {
        let mut environment =
            resolver
                .resolve(endpoint)
                .map_err(|source| StartupError::Environment {
                    endpoint: endpoint.clone(),
                    source,
                })?;
        environment.serialize_secrets();
        let resolved = environment
            .into_resolved()
            .map_err(|reason| StartupError::Environment {
                endpoint: endpoint.clone(),
                source: EnvError::Format {
                    path: resolver.config_dir().join(endpoint),
                    reason,
                },
            })?;

        if !resolved.request.schema.is_empty() {
            compile_schema(&serde_json::Value::Object(resolved.request.schema)).map_err(
                |reason| StartupError::Schema {
                    endpoint: endpoint.clone(),
                    reason,
                },
            )?;
        }

        if render && resolved.template.enabled {
            renderer
                .render(
                    endpoint,
                    &serde_json::Value::Object(resolved.template.context),
                    &resolved.template.rendering_options,
                )
                .map_err(|source| StartupError::Template {
                    endpoint: endpoint.clone(),
                    source,
                })?;
        }
        tracing::debug!(endpoint = %endpoint, "Endpoint checked");
    }

    Ok(endpoints.len())
}

/// Builds the context and runs the startup endpoint pass.
pub fn prepare(config: AppConfig) -> Result<ServerContext, StartupError> {
    let ctx = build_context(config)?;
    let environments = &ctx.config().environments;
    let templates = &ctx.config().templates;

    if environments.cache || templates.validate_on_startup {
        let count = check_endpoints(
            ctx.resolver(),
            ctx.renderer().as_ref(),
            templates.validate_on_startup,
        )?;
        tracing::info!(
            endpoints = count,
            rendered = templates.validate_on_startup,
            "Endpoints checked"
        );
    }
    if !environments.cache {
        ctx.clear_caches();
    }
    Ok(ctx)
}

/// Starts the watcher when `environments.watch` is set. The watcher stops
/// when the returned value is dropped.
pub fn start_watcher(ctx: &Arc<ServerContext>) -> Result<Option<RecommendedWatcher>, StartupError> {
    if !ctx.config().environments.watch {
        return Ok(None);
    }

    let directories = &ctx.config().directories;
    let mut paths = vec![directories.config.clone(), directories.common.clone()];
    paths.extend(directories.secrets.iter().filter(|dir| dir.is_dir()).cloned());

    let target = ctx.clone();
    let watcher = CacheWatcher::new(paths, move || target.clear_caches()).run()?;
    Ok(Some(watcher))
}

/// Offline check of a configuration directory.
///
/// Secret references resolve to placeholders, so neither the secrets
/// directory nor real tokens are needed.
pub fn validate_configuration(config: &AppConfig) -> Result<usize, StartupError> {
    let loader = build_loader(config, SecretMode::Placeholder);

    let networks = &config.auth.networks;
    NetworkWhitelist::parse(&networks.whitelist, networks.private_only)?;
    let users = load_users(&config.auth.users_file, &loader)?;
    for user in &users {
        NetworkWhitelist::parse(&user.has_access.from_networks, networks.private_only)?;
        for pattern in &user.has_access.to_paths {
            PathPattern::new(pattern)?;
        }
    }
    tracing::info!(users = users.len(), "Users file is valid");

    let resolver = EnvironmentResolver::new(config.directories.config.clone(), loader);
    let renderer = build_renderer(config);
    check_endpoints(&resolver, renderer.as_ref(), true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::read_config;
    use std::fs;
    use tempfile::TempDir;

    const USERS: &str = r#"
- id: alice
  token: !scs-secret tokens.yaml#alice
  has_access:
    to_paths: ["/configs/app/*"]
    from_networks: ["127.0.0.1"]
- id: bob
  token: !scs-secret tokens.yaml#bob
  has_access:
    to_paths: ["/configs/*"]
    from_networks: ["127.0.0.0/8"]
"#;

    fn tree() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("config/app")).unwrap();
        fs::create_dir_all(root.join("common")).unwrap();
        fs::create_dir_all(root.join("secrets")).unwrap();
        fs::write(
            root.join("scs-configuration.yaml"),
            "auth:\n  networks:\n    whitelist: [127.0.0.0/8]\n",
        )
        .unwrap();
        fs::write(root.join("scs-users.yaml"), USERS).unwrap();
        fs::write(root.join("secrets/tokens.yaml"), "alice: a-token\nbob: b-token\n").unwrap();
        fs::write(root.join("common/db.yaml"), "host: db.internal\n").unwrap();
        fs::write(
            root.join("config/app/scs-env.yaml"),
            "template:\n  context:\n    db: !scs-common db.yaml#host\n    password: !scs-secret tokens.yaml#alice\n",
        )
        .unwrap();
        fs::write(root.join("config/app/app.conf"), "host={{ db }}\n").unwrap();
        fs::write(root.join("config/readme.txt"), "static {{ not rendered }}\n").unwrap();
        fs::write(
            root.join("config/readme.txt.scs-env.yaml"),
            "template:\n  enabled: false\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_prepare_builds_context() {
        let dir = tree();
        let config = read_config(dir.path()).unwrap();
        let ctx = prepare(config).unwrap();
        assert_eq!(ctx.access().user_count(), 2);
        assert!(!ctx.resolver().loader().cache().is_empty());
    }

    #[test]
    fn test_prepare_without_cache_leaves_cache_empty() {
        let dir = tree();
        let mut config = read_config(dir.path()).unwrap();
        config.environments.cache = false;
        let ctx = prepare(config).unwrap();
        assert!(ctx.resolver().loader().cache().is_empty());
    }

    #[test]
    fn test_broken_template_fails_startup() {
        let dir = tree();
        fs::write(dir.path().join("config/app/app.conf"), "{% if %}\n").unwrap();
        let config = read_config(dir.path()).unwrap();
        let err = prepare(config).unwrap_err();
        assert!(matches!(err, StartupError::Template { ref endpoint, .. } if endpoint == "app/app.conf"));
    }

    #[test]
    fn test_broken_template_ignored_without_validation() {
        let dir = tree();
        fs::write(dir.path().join("config/app/app.conf"), "{% if %}\n").unwrap();
        let mut config = read_config(dir.path()).unwrap();
        config.templates.validate_on_startup = false;
        assert!(prepare(config).is_ok());
    }

    #[test]
    fn test_invalid_request_schema_fails_startup() {
        let dir = tree();
        fs::write(
            dir.path().join("config/app/app.conf.scs-env.yaml"),
            "request:\n  methods: [POST]\n  schema:\n    type: 12\n",
        )
        .unwrap();
        let config = read_config(dir.path()).unwrap();
        let err = prepare(config).unwrap_err();
        assert!(matches!(err, StartupError::Schema { .. }));
    }

    #[test]
    fn test_env_error_names_endpoint() {
        let dir = tree();
        fs::write(dir.path().join("config/app/scs-env.yaml"), "template: [\n").unwrap();
        let config = read_config(dir.path()).unwrap();
        match prepare(config).unwrap_err() {
            StartupError::Environment { endpoint, source } => {
                assert_eq!(endpoint, "app/app.conf");
                assert_eq!(source.id(), "env-syntax-error");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validate_does_not_need_secrets() {
        let dir = tree();
        fs::remove_dir_all(dir.path().join("secrets")).unwrap();
        let config = read_config(dir.path()).unwrap();
        assert_eq!(validate_configuration(&config).unwrap(), 2);
    }

    #[test]
    fn test_validate_rejects_bad_user_network() {
        let dir = tree();
        fs::write(
            dir.path().join("scs-users.yaml"),
            "- id: x\n  token: t\n  has_access:\n    to_paths: []\n    from_networks: [nonsense]\n",
        )
        .unwrap();
        let config = read_config(dir.path()).unwrap();
        assert!(matches!(
            validate_configuration(&config),
            Err(StartupError::AccessControl(_))
        ));
    }
}

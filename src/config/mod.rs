//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! <config dir>/scs-configuration.yaml
//!     → loader.rs (YAML with !scs-expand-env, deserialize, absolute paths)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! With environments.watch:
//!     watcher.rs detects a change below the served directories
//!     → parsed-file cache and compiled templates are dropped
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, read_config, ConfigError};
pub use schema::{
    AppConfig, AuthConfig, DirectoriesConfig, EnvironmentsConfig, LogFormat, LogsConfig,
    MetricsConfig, ServerConfig, TemplatesConfig, TlsConfig, CONFIG_FILE_NAME,
};
pub use watcher::CacheWatcher;

/// Environment variable naming the configuration directory.
pub const CONFIG_DIR_ENV: &str = "SCS_CONFIG_DIR";

//! Per-endpoint environments.
//!
//! # Data Flow
//! ```text
//! request path "a/b/c.yml"
//!     → resolver.rs (env_file_hierarchy: scs-env.yaml … a/b/c.yml.scs-env.yaml)
//!     → yaml loader (parse, resolve tags, cached)
//!     → schema.rs (structural validation, no defaults)
//!     → schema.rs (one-level merge onto the defaults)
//!     → Environment (may hold secret markers)
//! ```
//!
//! # Design Decisions
//! - Missing env files are skipped, never cached
//! - Syntax, shape and reference errors stay distinguishable up to the
//!   HTTP error id

pub mod endpoints;
pub mod resolver;
pub mod schema;

use std::path::PathBuf;

use thiserror::Error;

use crate::yaml::LoadError;

pub use endpoints::{endpoint_exists, is_env_file, list_endpoints, normalize_endpoint};
pub use resolver::{env_file_hierarchy, EnvironmentResolver, ENV_FILE_NAME, ENV_FILE_SUFFIX};
pub use schema::{
    compile_schema, Environment, RequestSection, ResolvedEnvironment, ResponseSection,
    TemplateSection,
};

/// Errors raised while resolving an environment.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("env file {} could not be parsed: {source}", path.display())]
    Syntax {
        path: PathBuf,
        #[source]
        source: LoadError,
    },

    #[error("env file {} has an invalid format: {reason}", path.display())]
    Format { path: PathBuf, reason: String },

    #[error("env file {} could not be loaded: {source}", path.display())]
    Reference {
        path: PathBuf,
        #[source]
        source: LoadError,
    },
}

impl EnvError {
    /// Stable error id reported to clients.
    pub fn id(&self) -> &'static str {
        match self {
            EnvError::Syntax { .. } => "env-syntax-error",
            EnvError::Format { .. } => "env-format-error",
            EnvError::Reference { .. } => "env-reference-error",
        }
    }
}

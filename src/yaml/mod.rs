//! Reference-resolving YAML subsystem.
//!
//! # Data Flow
//! ```text
//! file on disk
//!     → loader.rs (parse, materialize !scs-gen-secret, persist)
//!     → loader.rs (resolve reference tags, recursively through the cache)
//!     → value.rs (Value tree with Secret markers)
//!     → secrets.rs (strip markers, collect ids for the audit log)
//! ```
//!
//! # Design Decisions
//! - Closed set of tags; each file kind accepts only a subset
//! - Cache hits are deep copies, callers may mutate freely
//! - Reference and key errors are distinct from syntax errors

pub mod cache;
pub mod loader;
pub mod secrets;
pub mod tags;
pub mod value;

use std::path::PathBuf;

use thiserror::Error;

pub use cache::FileCache;
pub use loader::{FileKind, Loaded, LoaderOptions, ProcessEnv, SecretMode, VarSource, YamlLoader};
pub use secrets::serialize_secrets;
pub use tags::{AttributePath, FileReference, ReferenceTag, TagKind};
pub use value::{Mapping, Secret, Value};

/// Errors raised while loading a YAML file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML syntax in {}: {source}", path.display())]
    Syntax {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid document {}: {reason}", path.display())]
    InvalidDocument { path: PathBuf, reason: String },

    #[error("the file {} has key names containing dots", path.display())]
    InvalidKey { path: PathBuf },

    #[error("the reference '{reference}' could not be resolved: {reason}")]
    Reference { reference: String, reason: String },

    #[error("environment variable {name} not defined (used in {})", path.display())]
    MissingEnvVar { name: String, path: PathBuf },

    #[error("tag {tag} is not supported in {}", path.display())]
    UnknownTag { tag: String, path: PathBuf },

    #[error("failed to persist generated secret to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LoadError {
    pub(crate) fn reference(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        LoadError::Reference {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// True for YAML syntax errors, as opposed to errors in the referenced
    /// data or the environment.
    pub fn is_syntax(&self) -> bool {
        matches!(self, LoadError::Syntax { .. })
    }
}

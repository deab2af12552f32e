//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (client IP, Authorization header, path):
//!     → whitelist.rs (global network whitelist)
//!     → rate_limit.rs (failed-auth counter per IP)
//!     → access_control.rs (token → user, user whitelist, path patterns)
//!     → AuthDecision (+ audit event)
//! ```
//!
//! # Design Decisions
//! - Fail closed: anything not explicitly allowed is rejected
//! - Configuration problems (bad networks, uncovered user networks,
//!   duplicate tokens) are fatal at startup, never request-time errors
//! - Only unknown tokens count towards the rate limit

pub mod access_control;
pub mod path_pattern;
pub mod rate_limit;
pub mod whitelist;

use std::path::PathBuf;

use thiserror::Error;

use crate::yaml::LoadError;

pub use access_control::{bearer_token, AccessControl, AuthDecision, User, UserRecord};
pub use path_pattern::PathPattern;
pub use rate_limit::{Clock, RateLimiter, SystemClock};
pub use whitelist::NetworkWhitelist;

/// Errors raised while building the access control tables.
#[derive(Debug, Error)]
pub enum AccessControlError {
    #[error("invalid network '{network}': {reason}")]
    InvalidNetwork { network: String, reason: String },

    #[error("private_only enabled, but network {network} is not private")]
    NotPrivate { network: String },

    #[error("network whitelist of user {user} not fully covered by global whitelist")]
    NotSubset { user: String },

    #[error("user id {user} is defined more than once")]
    DuplicateUser { user: String },

    #[error("token of user {user} is already used by another user")]
    DuplicateToken { user: String },

    #[error("invalid path pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to load users file: {0}")]
    UsersFile(#[source] LoadError),

    #[error("users file {} has an invalid format: {reason}", path.display())]
    UsersFormat { path: PathBuf, reason: String },
}

//! Token, IP and path based access control.
//!
//! # Check Order
//! ```text
//! client IP in global whitelist?   no → UnauthorizedIp (not audited, not counted)
//! IP rate limited?                 yes → RateLimited
//! bearer token known?              no → Unauthenticated (counted)
//! IP in user's whitelist?          no → UnauthorizedIp
//! path matches a user pattern?     no → UnauthorizedPath
//!                                  → Allowed
//! ```
//!
//! All tables are built once at startup and read without locking; only the
//! rate limiter is mutated per request.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::path::Path;

use serde::Deserialize;

use crate::config::schema::AuthConfig;
use crate::observability::audit::{AuditEvent, AuditEventType};
use crate::yaml::{serialize_secrets, FileKind, YamlLoader};

use super::path_pattern::PathPattern;
use super::rate_limit::RateLimiter;
use super::whitelist::NetworkWhitelist;
use super::AccessControlError;

/// One entry of the users file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserRecord {
    pub id: String,
    pub token: String,
    pub has_access: HasAccess,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HasAccess {
    pub to_paths: Vec<String>,
    pub from_networks: Vec<String>,
}

/// A user with parsed whitelist and compiled path patterns.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub whitelist: NetworkWhitelist,
    pub allowed_paths: Vec<PathPattern>,
}

impl User {
    pub fn may_access(&self, path: &str) -> bool {
        self.allowed_paths.iter().any(|pattern| pattern.matches(path))
    }
}

/// Outcome of [`AccessControl::authorize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Allowed { user: String },
    RateLimited,
    Unauthenticated,
    /// `user` is `None` when the global whitelist rejected the address.
    UnauthorizedIp { user: Option<String> },
    UnauthorizedPath { user: String },
}

impl AuthDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AuthDecision::Allowed { .. })
    }

    /// Short label used in logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            AuthDecision::Allowed { .. } => "allowed",
            AuthDecision::RateLimited => "rate_limited",
            AuthDecision::Unauthenticated => "unauthenticated",
            AuthDecision::UnauthorizedIp { user: None } => "ip_not_whitelisted",
            AuthDecision::UnauthorizedIp { .. } => "unauthorized_ip",
            AuthDecision::UnauthorizedPath { .. } => "unauthorized_path",
        }
    }

    /// The audit event for this decision, if it is audited.
    pub fn audit_event(&self, ip: IpAddr, path: &str) -> Option<AuditEvent> {
        match self {
            AuthDecision::Allowed { .. } | AuthDecision::UnauthorizedIp { user: None } => None,
            AuthDecision::RateLimited => {
                Some(AuditEvent::new(AuditEventType::RateLimited, ip, path))
            }
            AuthDecision::Unauthenticated => {
                Some(AuditEvent::new(AuditEventType::Unauthenticated, ip, path))
            }
            AuthDecision::UnauthorizedIp { user: Some(user) } => {
                Some(AuditEvent::new(AuditEventType::UnauthorizedIp, ip, path).with_user(user))
            }
            AuthDecision::UnauthorizedPath { user } => {
                Some(AuditEvent::new(AuditEventType::UnauthorizedPath, ip, path).with_user(user))
            }
        }
    }
}

/// Loads the users file, replacing secret references by their values.
pub fn load_users(path: &Path, loader: &YamlLoader) -> Result<Vec<UserRecord>, AccessControlError> {
    let mut loaded = loader
        .load(path, FileKind::Users)
        .map_err(AccessControlError::UsersFile)?
        .value;
    serialize_secrets(&mut loaded);
    serde_json::from_value(loaded.to_json()).map_err(|e| AccessControlError::UsersFormat {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// The access control tables and the failed-auth rate limiter.
#[derive(Debug)]
pub struct AccessControl {
    global: NetworkWhitelist,
    users: HashMap<String, User>,
    limiter: RateLimiter,
}

impl AccessControl {
    /// Builds the tables, enforcing that every user whitelist is covered by
    /// the global one and that ids and tokens are unique.
    pub fn new(
        global: NetworkWhitelist,
        records: Vec<UserRecord>,
        private_only: bool,
        limiter: RateLimiter,
    ) -> Result<Self, AccessControlError> {
        let mut users = HashMap::with_capacity(records.len());
        let mut ids = HashSet::with_capacity(records.len());

        for record in records {
            if !ids.insert(record.id.clone()) {
                return Err(AccessControlError::DuplicateUser { user: record.id });
            }
            if users.contains_key(&record.token) {
                return Err(AccessControlError::DuplicateToken { user: record.id });
            }

            let whitelist = NetworkWhitelist::parse(&record.has_access.from_networks, private_only)?;
            if !whitelist.is_subset_of(&global) {
                return Err(AccessControlError::NotSubset { user: record.id });
            }
            let allowed_paths = record
                .has_access
                .to_paths
                .iter()
                .map(|pattern| PathPattern::new(pattern))
                .collect::<Result<Vec<_>, _>>()?;

            users.insert(
                record.token,
                User {
                    id: record.id,
                    whitelist,
                    allowed_paths,
                },
            );
        }

        Ok(Self {
            global,
            users,
            limiter,
        })
    }

    /// Loads the users file and builds the tables from the auth settings.
    pub fn from_config(auth: &AuthConfig, loader: &YamlLoader) -> Result<Self, AccessControlError> {
        let global = NetworkWhitelist::parse(&auth.networks.whitelist, auth.networks.private_only)?;
        let records = load_users(&auth.users_file, loader)?;
        let limiter = RateLimiter::new(auth.max_auth_fails_per_window, auth.window_minutes);
        let access = Self::new(global, records, auth.networks.private_only, limiter)?;
        tracing::info!(
            users = access.users.len(),
            networks = access.global.len(),
            "Access control loaded"
        );
        Ok(access)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Decides whether a request may proceed.
    pub fn authorize(&self, token: Option<&str>, ip: IpAddr, path: &str) -> AuthDecision {
        if !self.global.contains(ip) {
            return AuthDecision::UnauthorizedIp { user: None };
        }

        if self.limiter.is_limited(ip) {
            return AuthDecision::RateLimited;
        }

        let Some(user) = token.and_then(|token| self.users.get(token)) else {
            let failures = self.limiter.register_failure(ip);
            tracing::debug!(%ip, failures, "Failed authentication attempt");
            return AuthDecision::Unauthenticated;
        };

        if !user.whitelist.contains(ip) {
            return AuthDecision::UnauthorizedIp {
                user: Some(user.id.clone()),
            };
        }

        if !user.may_access(path) {
            return AuthDecision::UnauthorizedPath {
                user: user.id.clone(),
            };
        }

        AuthDecision::Allowed {
            user: user.id.clone(),
        }
    }
}

/// Extracts the bearer token from an `Authorization` header value.
pub fn bearer_token(header: &str) -> &str {
    header.strip_prefix("Bearer ").unwrap_or(header)
}

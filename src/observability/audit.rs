//! Audit events.
//!
//! Audit events record authentication decisions and which configs and
//! secrets were handed out. They are emitted as `tracing` events on the
//! [`AUDIT_TARGET`] target, which the logging setup routes to a dedicated
//! JSON-lines sink.

use std::fmt;
use std::net::IpAddr;

use serde::Serialize;

/// `tracing` target of all audit events.
pub const AUDIT_TARGET: &str = "scs::audit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditEventType {
    ConfigLoaded,
    SecretsLoaded,
    Unauthenticated,
    UnauthorizedIp,
    UnauthorizedPath,
    RateLimited,
}

impl AuditEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditEventType::ConfigLoaded => "config-loaded",
            AuditEventType::SecretsLoaded => "secrets-loaded",
            AuditEventType::Unauthenticated => "unauthenticated",
            AuditEventType::UnauthorizedIp => "unauthorized-ip",
            AuditEventType::UnauthorizedPath => "unauthorized-path",
            AuditEventType::RateLimited => "rate-limited",
        }
    }

    pub fn level(self) -> tracing::Level {
        match self {
            AuditEventType::ConfigLoaded | AuditEventType::SecretsLoaded => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        }
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditDetails {
    pub ip: IpAddr,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    #[serde(rename = "type")]
    pub event_type: AuditEventType,
    pub details: AuditDetails,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, ip: IpAddr, path: impl Into<String>) -> Self {
        Self {
            event_type,
            details: AuditDetails {
                ip,
                path: path.into(),
                user: None,
                secrets: Vec::new(),
            },
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.details.user = Some(user.into());
        self
    }

    pub fn with_secrets<I, S>(mut self, secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.details.secrets = secrets.into_iter().map(Into::into).collect();
        self
    }

    /// Human readable description of the event.
    pub fn message(&self) -> String {
        let d = &self.details;
        let user = d.user.as_deref().unwrap_or("None");
        match self.event_type {
            AuditEventType::ConfigLoaded => format!("User '{user}' has loaded {}", d.path),
            AuditEventType::SecretsLoaded => format!(
                "User '{user}' has loaded the following secrets: {}",
                d.secrets.join(", ")
            ),
            AuditEventType::Unauthenticated => {
                format!("Unauthenticated request to {} from {}", d.path, d.ip)
            }
            AuditEventType::UnauthorizedIp => {
                format!("User '{user}' connected from unauthorized IP {}", d.ip)
            }
            AuditEventType::UnauthorizedPath => {
                format!("User '{user}' tried to access unauthorized path: {}", d.path)
            }
            AuditEventType::RateLimited => {
                format!("Requests from {} are rate limited by the auth module", d.ip)
            }
        }
    }

    /// Writes the event to the audit log.
    pub fn emit(&self) {
        let d = &self.details;
        let message = self.message();
        let user = d.user.as_deref().unwrap_or_default();
        let secrets = d.secrets.join(",");
        if self.event_type.level() == tracing::Level::INFO {
            tracing::info!(
                target: AUDIT_TARGET,
                r#type = self.event_type.as_str(),
                ip = %d.ip,
                path = %d.path,
                user,
                secrets,
                "{message}"
            );
        } else {
            tracing::warn!(
                target: AUDIT_TARGET,
                r#type = self.event_type.as_str(),
                ip = %d.ip,
                path = %d.path,
                user,
                secrets,
                "{message}"
            );
        }
    }
}

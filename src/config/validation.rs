//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that referenced directories and files exist
//! - Validate value ranges (limits > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;

use super::schema::AppConfig;

/// One problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn require_dir(errors: &mut Vec<ValidationError>, field: &'static str, path: &Path) {
    if !path.is_dir() {
        errors.push(ValidationError::new(
            field,
            format!("directory {} does not exist", path.display()),
        ));
    }
}

fn require_file(errors: &mut Vec<ValidationError>, field: &'static str, path: &Path) {
    if !path.is_file() {
        errors.push(ValidationError::new(
            field,
            format!("file {} does not exist", path.display()),
        ));
    }
}

fn require_addr(errors: &mut Vec<ValidationError>, field: &'static str, addr: &str) {
    if SocketAddr::from_str(addr).is_err() {
        errors.push(ValidationError::new(
            field,
            format!("'{addr}' is not a valid socket address"),
        ));
    }
}

/// Validates a configuration whose paths have been made absolute.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    require_dir(&mut errors, "directories.config", &config.directories.config);
    require_dir(&mut errors, "directories.common", &config.directories.common);
    if let Some(secrets) = &config.directories.secrets {
        require_dir(&mut errors, "directories.secrets", secrets);
    }

    if tracing::Level::from_str(&config.logs.application.level).is_err() {
        errors.push(ValidationError::new(
            "logs.application.level",
            format!("unknown level '{}'", config.logs.application.level),
        ));
    }
    if let Some(path) = &config.logs.audit.path {
        if !path.parent().is_some_and(Path::is_dir) {
            errors.push(ValidationError::new(
                "logs.audit.path",
                format!("parent directory of {} does not exist", path.display()),
            ));
        }
    }

    require_file(&mut errors, "auth.users_file", &config.auth.users_file);
    if config.auth.networks.whitelist.is_empty() {
        errors.push(ValidationError::new(
            "auth.networks.whitelist",
            "at least one network must be whitelisted",
        ));
    }
    if config.auth.max_auth_fails_per_window == 0 {
        errors.push(ValidationError::new(
            "auth.max_auth_fails_per_window",
            "must be greater than 0",
        ));
    }
    if config.auth.window_minutes == 0 {
        errors.push(ValidationError::new("auth.window_minutes", "must be greater than 0"));
    }

    require_addr(&mut errors, "server.bind_address", &config.server.bind_address);
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "server.request_timeout_secs",
            "must be greater than 0",
        ));
    }
    if config.server.max_body_size == 0 {
        errors.push(ValidationError::new("server.max_body_size", "must be greater than 0"));
    }
    if let Some(tls) = &config.server.tls {
        require_file(&mut errors, "server.tls.cert_path", &tls.cert_path);
        require_file(&mut errors, "server.tls.key_path", &tls.key_path);
    }

    if config.metrics.enabled {
        require_addr(&mut errors, "metrics.bind_address", &config.metrics.bind_address);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn valid_config(root: &Path) -> AppConfig {
        for dir in ["config", "common", "secrets"] {
            fs::create_dir_all(root.join(dir)).unwrap();
        }
        fs::write(root.join("scs-users.yaml"), "[]").unwrap();
        let mut config = AppConfig::default();
        config.auth.networks.whitelist = vec!["10.0.0.0/8".to_string()];
        config.resolve_paths(root);
        config
    }

    #[test]
    fn test_valid() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(validate_config(&valid_config(dir.path())), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = valid_config(dir.path());
        config.auth.window_minutes = 0;
        config.auth.networks.whitelist.clear();
        config.server.bind_address = "localhost".to_string();
        config.logs.application.level = "loud".to_string();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "logs.application.level",
                "auth.networks.whitelist",
                "auth.window_minutes",
                "server.bind_address",
            ]
        );
    }

    #[test]
    fn test_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = valid_config(dir.path());
        config.directories.common = dir.path().join("nope");
        config.directories.secrets = None;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "directories.common");
    }
}

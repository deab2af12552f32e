//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the `tracing` subscriber
//! - Route audit events to their own JSON-lines sink
//! - Configure log level from config, overridable with `RUST_LOG`
//!
//! # Design Decisions
//! - JSON format for production, pretty format for development
//! - Audit events never appear in the application log and vice versa

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::filter::{filter_fn, EnvFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer, Registry};

use crate::config::{LogFormat, LogsConfig};

use super::audit::AUDIT_TARGET;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to open audit log {}: {source}", path.display())]
    AuditFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid log filter: {0}")]
    Filter(String),

    #[error("failed to install subscriber: {0}")]
    Init(String),
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn application_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!("{level},tower_http=info"))
            .map_err(|e| LoggingError::Filter(e.to_string()))?,
    };
    let audit_off = format!("{AUDIT_TARGET}=off")
        .parse()
        .map_err(|e: tracing_subscriber::filter::ParseError| LoggingError::Filter(e.to_string()))?;
    Ok(filter.add_directive(audit_off))
}

fn audit_layer(config: &LogsConfig) -> Result<Option<BoxedLayer>, LoggingError> {
    if !config.audit.enabled {
        return Ok(None);
    }
    let only_audit = filter_fn(|meta| meta.target() == AUDIT_TARGET);
    let layer = fmt::layer()
        .json()
        .flatten_event(true)
        .with_current_span(false)
        .with_span_list(false)
        .with_target(false);

    let layer = match &config.audit.path {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LoggingError::AuditFile {
                    path: path.clone(),
                    source,
                })?;
            layer.with_writer(Mutex::new(file)).with_filter(only_audit).boxed()
        }
        None => layer.with_writer(std::io::stdout).with_filter(only_audit).boxed(),
    };
    Ok(Some(layer))
}

/// Installs the global subscriber.
pub fn init(config: &LogsConfig) -> Result<(), LoggingError> {
    let filter = application_filter(&config.application.level)?;
    let application: BoxedLayer = match config.application.format {
        LogFormat::Json => fmt::layer().json().with_filter(filter).boxed(),
        LogFormat::Pretty => fmt::layer().with_filter(filter).boxed(),
    };

    let mut layers = vec![application];
    layers.extend(audit_layer(config)?);

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))
}

//! Simple Configuration Server
//!
//! Serves per-client configuration files over HTTP. Files live in a config
//! directory, are rendered as templates with a context assembled from
//! YAML env files, and may pull in shared values and secrets through
//! reference tags. Every request is authenticated by bearer token and
//! authorized by client network and path.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server ──▶ http::auth ──▶ http::configs
//!                     (request id,     (security:     │
//!                      trace, limits)   whitelists,    ▼
//!                                       patterns,   environment::resolver
//!                                       rate limit)    │ (env file hierarchy,
//!                                                      │  one-level merge)
//!                                                      ▼
//!                                                   yaml::loader
//!                                                      │ (!scs-* tags, cache,
//!                                                      │  generated secrets)
//!                                                      ▼
//!     Client Response ◀── templates::renderer / static file
//!
//!     Cross-cutting: config, observability (logs, audit, metrics), lifecycle
//! ```

// Core subsystems
pub mod config;
pub mod environment;
pub mod http;
pub mod templates;
pub mod yaml;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::AppConfig;
pub use http::{HttpServer, ServerContext};
pub use lifecycle::Shutdown;

//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID, tracing, limits)
//!     → auth.rs (client IP, token, whitelist and path checks)
//!     → configs.rs (environment, body validation, render or static file)
//!     → error.rs (JSON error shape for every rejection)
//!     → Send to client
//! ```

pub mod auth;
pub mod configs;
pub mod error;
pub mod request;
pub mod server;
pub mod tls;

pub use error::ApiError;
pub use request::{client_ip, ClientIp, X_REQUEST_ID};
pub use server::{HttpServer, ServerContext};

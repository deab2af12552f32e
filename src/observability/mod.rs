//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured application log events)
//!     → audit.rs (audit events on the scs::audit target)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Application log (stdout, pretty or JSON)
//!     → Audit log (JSON lines, stdout or file)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Audit events share the tracing pipeline but have their own sink
//! - Request ID flows through all request logs
//! - Metrics are cheap (atomic increments)

pub mod audit;
pub mod logging;
pub mod metrics;

pub use audit::{AuditEvent, AuditEventType, AUDIT_TARGET};

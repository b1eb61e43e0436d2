//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! routing, health and load_balancer produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (unit_id, backend, mode) instead of formatted strings
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

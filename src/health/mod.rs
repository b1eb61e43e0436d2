//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! On-demand checks (checker.rs), from the selection hot path:
//!     cache.rs: failure recorded within TTL?
//!     → yes: report dead without probing
//!     → no:  probe.rs, up to N attempts
//!            → record failure / clear record
//!
//! Background checks (monitor.rs), when enabled:
//!     Periodic timer
//!     → Probe every replica (and optionally primary)
//!     → Activate / deactivate in the shared BackendSet
//! ```
//!
//! # Design Decisions
//! - Probe errors and timeouts count as "dead"; they never reach callers
//! - Liveness and writability are cached independently
//! - Failure records live process-wide or per unit of work (config)

pub mod cache;
pub mod checker;
pub mod monitor;
pub mod probe;

pub use cache::{CacheScope, CheckKind};
pub use checker::{HealthChecker, ProbeOptions};
pub use monitor::{FailoverMonitor, MonitorHandle, SweepReport};
pub use probe::{BackendProbe, ProbeError, TcpProbe};

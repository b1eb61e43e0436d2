//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → Build backend set, checker, router → Start monitor
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Broadcast stop → Join monitor with deadline
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then routing, then background tasks
//! - Shutdown has timeout: the monitor is abandoned after its deadline

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{build, Runtime};

//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Unit of work opens (dispatcher):
//!     → context.rs (ExecutionContext with a fresh mode stack)
//!     → matcher.rs (per-operation overrides pick the base mode)
//!
//! Each data access:
//!     → state.rs (current mode: Primary or Replica)
//!     → router.rs (resolve_read / resolve_write)
//!         → pinned backend, else load_balancer order + health checks
//!     → Return: BackendId, pinned for the rest of the unit
//!
//! Unit of work closes:
//!     → context dropped; pins and stack go with it
//! ```
//!
//! # Design Decisions
//! - Context is passed explicitly, never stored in thread-locals
//! - One backend per (database, mode) for the whole unit of work
//! - Mode changes are scoped and restored on drop
//! - Deterministic except for replica shuffling

pub mod context;
pub mod matcher;
pub mod mode;
pub mod router;
pub mod state;

pub use context::{ExecutionContext, ModeGuard};
pub use matcher::OverrideTable;
pub use mode::RoutingMode;
pub use router::{ReplicationRouter, Router};
pub use state::StateStack;

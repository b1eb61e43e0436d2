//! Request-scoped replica routing.
//!
//! Picks a concrete database backend for every data access of a logical
//! unit of work: primaries for writes, replicas for reads, with dead
//! backends skipped behind a short-lived negative cache and a consistent
//! backend pinned per unit of work.

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod routing;

// Backend management
pub mod health;
pub mod load_balancer;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::RouterConfig;
pub use error::{RoutingError, RoutingResult};
pub use health::{BackendProbe, FailoverMonitor, HealthChecker, MonitorHandle, ProbeError, TcpProbe};
pub use http::{Dispatcher, UnitDescriptor};
pub use lifecycle::Shutdown;
pub use load_balancer::backend::BackendId;
pub use load_balancer::BackendSet;
pub use routing::{ExecutionContext, ReplicationRouter, Router, RoutingMode};

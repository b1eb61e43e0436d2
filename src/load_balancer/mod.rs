//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Logical database identified (default or named)
//!     → pool.rs (active primaries / replicas snapshot)
//!     → Apply selection order:
//!         - shuffled.rs (uniform random permutation, replicas)
//!         - ordered.rs (configured order, write-side primaries)
//!     → Router probes candidates in that order and pins the first alive one
//! ```
//!
//! # Design Decisions
//! - Strategies only order candidates; health is the router's concern
//! - Replica order is stochastic to spread load
//! - Primary order is predictable for operational reasons
//! - The pool is shared; strategies are stateless

pub mod backend;
pub mod ordered;
pub mod pool;
pub mod shuffled;

use crate::load_balancer::backend::BackendId;

/// Orders candidate backends before they are probed.
pub trait SelectionOrder: Send + Sync + std::fmt::Debug {
    /// Returns the candidates in the order they should be tried.
    fn order(&self, candidates: &[BackendId]) -> Vec<BackendId>;
}

pub use ordered::Configured;
pub use pool::BackendSet;
pub use shuffled::Shuffled;

//! Errors that escape the routing core.
//!
//! Transient backend unavailability never shows up here: probe failures are
//! absorbed by the health checker and resolved by falling back to another
//! backend. Only caller misuse and bad configuration surface as errors.

use thiserror::Error;

use crate::routing::mode::RoutingMode;

/// Errors returned by routing operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoutingError {
    /// A write was requested while the unit of work is routed to replicas.
    #[error("write access requested while routing in {mode} mode")]
    IllegalModeAccess { mode: RoutingMode },

    /// `pop` without a matching `push`.
    #[error("routing mode stack underflow: revert without matching use")]
    StackUnderflow,

    /// Configuration rejected at construction time.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Result alias for routing operations.
pub type RoutingResult<T> = Result<T, RoutingError>;

//! Routing mode stack.
//!
//! # Responsibilities
//! - Track the current routing mode of one unit of work
//! - Support nested overrides that unwind back to the caller's mode
//! - Lock the mode for a section of code ("change disabled")
//!
//! # Design Decisions
//! - A stack rather than a flag: nested scopes restore whatever the caller had
//! - Mismatched pops are surfaced as `StackUnderflow`, never clamped
//! - The entry pushed by `reset` is the base and cannot be popped

use crate::error::{RoutingError, RoutingResult};
use crate::routing::mode::RoutingMode;

#[derive(Debug, Clone)]
pub struct StateStack {
    modes: Vec<RoutingMode>,
    /// Number of entries installed by `reset` that `pop` must not remove.
    floor: usize,
    change_enabled: bool,
}

impl StateStack {
    pub fn new() -> Self {
        Self {
            modes: Vec::new(),
            floor: 0,
            change_enabled: true,
        }
    }

    /// Current mode, `Primary` when nothing has been pushed.
    pub fn current(&self) -> RoutingMode {
        self.modes.last().copied().unwrap_or(RoutingMode::Primary)
    }

    /// Push a mode and return the mode that is now effective.
    ///
    /// With mode change disabled the current mode is pushed instead, so the
    /// paired `pop` still balances.
    pub fn push(&mut self, mode: RoutingMode) -> RoutingMode {
        let effective = if self.change_enabled {
            mode
        } else {
            self.current()
        };
        self.modes.push(effective);
        effective
    }

    /// Remove the top entry and return it.
    pub fn pop(&mut self) -> RoutingResult<RoutingMode> {
        if self.modes.len() <= self.floor {
            return Err(RoutingError::StackUnderflow);
        }
        self.modes.pop().ok_or(RoutingError::StackUnderflow)
    }

    pub fn set_change_enabled(&mut self, enabled: bool) {
        self.change_enabled = enabled;
    }

    pub fn change_enabled(&self) -> bool {
        self.change_enabled
    }

    /// Clear the stack and install `mode` as its base entry.
    pub fn reset(&mut self, mode: RoutingMode) {
        self.modes.clear();
        self.change_enabled = true;
        self.modes.push(mode);
        self.floor = 1;
    }

    pub fn depth(&self) -> usize {
        self.modes.len()
    }
}

impl Default for StateStack {
    fn default() -> Self {
        Self::new()
    }
}

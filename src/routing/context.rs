//! Per-unit-of-work routing state.
//!
//! # Responsibilities
//! - Own the mode stack, pinned backends and unit-scoped health records
//! - Bracket one logical unit of work (`enter` / `exit`)
//! - Provide scoped mode overrides that restore the previous mode on drop
//!
//! # Design Decisions
//! - Passed explicitly by `&mut`; never looked up from ambient storage
//! - Never shared between units of work, so no internal locking
//! - Pins are keyed by (logical database, mode)

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use uuid::Uuid;

use crate::error::RoutingResult;
use crate::health::cache::LocalHealthCache;
use crate::load_balancer::backend::{BackendId, DEFAULT_DATABASE};
use crate::routing::mode::RoutingMode;
use crate::routing::state::StateStack;

/// Routing state of one logical unit of work (one request or task).
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    unit_id: Uuid,
    stack: StateStack,
    pinned: HashMap<(String, RoutingMode), BackendId>,
    health: LocalHealthCache,
}

impl ExecutionContext {
    /// Fresh context with an empty stack (current mode `Primary`).
    pub fn new() -> Self {
        Self {
            unit_id: Uuid::new_v4(),
            stack: StateStack::new(),
            pinned: HashMap::new(),
            health: LocalHealthCache::new(),
        }
    }

    /// Open a logical unit of work in `mode`.
    pub fn enter(mode: RoutingMode) -> Self {
        let mut cx = Self::new();
        cx.reset(mode);
        tracing::debug!(unit_id = %cx.unit_id, mode = %mode, "Enter logical unit");
        cx
    }

    /// Close the unit of work, returning the mode it ended in.
    pub fn exit(self) -> RoutingMode {
        let mode = self.current();
        tracing::debug!(
            unit_id = %self.unit_id,
            mode = %mode,
            pinned = self.pinned.len(),
            "Exit logical unit"
        );
        mode
    }

    /// Clear the stack and every pinned backend, then push `mode`.
    pub fn reset(&mut self, mode: RoutingMode) {
        self.pinned.clear();
        self.stack.reset(mode);
    }

    pub fn unit_id(&self) -> Uuid {
        self.unit_id
    }

    pub fn current(&self) -> RoutingMode {
        self.stack.current()
    }

    pub fn push(&mut self, mode: RoutingMode) -> RoutingMode {
        self.stack.push(mode)
    }

    pub fn pop(&mut self) -> RoutingResult<RoutingMode> {
        self.stack.pop()
    }

    pub fn set_mode_change_enabled(&mut self, enabled: bool) {
        self.stack.set_change_enabled(enabled);
    }

    pub fn mode_change_enabled(&self) -> bool {
        self.stack.change_enabled()
    }

    pub fn stack(&self) -> &StateStack {
        &self.stack
    }

    /// Backend pinned for `mode` in `database` (default database when `None`).
    pub fn pinned(&self, database: Option<&str>, mode: RoutingMode) -> Option<&BackendId> {
        let key = (database.unwrap_or(DEFAULT_DATABASE).to_string(), mode);
        self.pinned.get(&key)
    }

    pub fn pin(&mut self, database: Option<&str>, mode: RoutingMode, backend: BackendId) {
        let key = (database.unwrap_or(DEFAULT_DATABASE).to_string(), mode);
        self.pinned.insert(key, backend);
    }

    pub fn unpin(&mut self, database: Option<&str>, mode: RoutingMode) {
        let key = (database.unwrap_or(DEFAULT_DATABASE).to_string(), mode);
        self.pinned.remove(&key);
    }

    pub fn health_mut(&mut self) -> &mut LocalHealthCache {
        &mut self.health
    }

    /// Push `mode` for the lifetime of the returned guard.
    ///
    /// ```
    /// use replica_router::{ExecutionContext, RoutingMode};
    ///
    /// let mut cx = ExecutionContext::enter(RoutingMode::Replica);
    /// {
    ///     let scoped = cx.scoped(RoutingMode::Primary);
    ///     assert_eq!(scoped.current(), RoutingMode::Primary);
    /// }
    /// assert_eq!(cx.current(), RoutingMode::Replica);
    /// ```
    pub fn scoped(&mut self, mode: RoutingMode) -> ModeGuard<'_> {
        self.push(mode);
        ModeGuard { cx: self }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Pops the mode pushed by [`ExecutionContext::scoped`] when dropped.
#[derive(Debug)]
pub struct ModeGuard<'a> {
    cx: &'a mut ExecutionContext,
}

impl Deref for ModeGuard<'_> {
    type Target = ExecutionContext;
    fn deref(&self) -> &Self::Target {
        self.cx
    }
}

impl DerefMut for ModeGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.cx
    }
}

impl Drop for ModeGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.cx.pop() {
            tracing::error!(unit_id = %self.cx.unit_id, error = %e, "Unbalanced mode stack in scoped override");
        }
    }
}

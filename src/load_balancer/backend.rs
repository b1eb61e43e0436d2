//! Backend abstraction.
//!
//! # Responsibilities
//! - Name a single physical backend (`BackendId`)
//! - Describe one logical database: its primaries and replicas
//! - Track which of them are currently active

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Name of the logical database used when a caller does not name one.
pub const DEFAULT_DATABASE: &str = "default";

/// Identifier of a physical backend (a connection alias).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendId(Arc<str>);

impl BackendId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackendId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for BackendId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl Borrow<str> for BackendId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for BackendId {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for BackendId {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

/// Role a backend plays inside its logical database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendRole {
    Primary,
    Replica,
}

impl BackendRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendRole::Primary => "primary",
            BackendRole::Replica => "replica",
        }
    }
}

/// Configured layout of one logical database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseGroup {
    pub name: String,
    /// Primaries in configured order. Write selection walks this order.
    pub primaries: Vec<BackendId>,
    pub replicas: Vec<BackendId>,
}

impl DatabaseGroup {
    pub fn contains(&self, id: &str) -> bool {
        self.primaries.iter().any(|b| b == id) || self.replicas.iter().any(|b| b == id)
    }
}

/// Active/deactivated view of one group.
///
/// Active lists always keep the configured order of the group, so a
/// reactivated backend returns to its configured position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupState {
    pub active_primaries: Vec<BackendId>,
    pub deactivated_primaries: Vec<BackendId>,
    pub active_replicas: Vec<BackendId>,
    pub deactivated_replicas: Vec<BackendId>,
}

impl GroupState {
    /// Everything active, nothing deactivated.
    pub fn all_active(group: &DatabaseGroup) -> Self {
        Self {
            active_primaries: group.primaries.clone(),
            deactivated_primaries: Vec::new(),
            active_replicas: group.replicas.clone(),
            deactivated_replicas: Vec::new(),
        }
    }

    pub fn is_active(&self, role: BackendRole, id: &str) -> bool {
        match role {
            BackendRole::Primary => self.active_primaries.iter().any(|b| b == id),
            BackendRole::Replica => self.active_replicas.iter().any(|b| b == id),
        }
    }

    /// Copy of this state with `id` moved to the deactivated list.
    pub(crate) fn with_deactivated(&self, role: BackendRole, id: &BackendId) -> Self {
        let mut next = self.clone();
        let (active, deactivated) = next.lists_mut(role);
        active.retain(|b| b != id);
        if !deactivated.contains(id) {
            deactivated.push(id.clone());
        }
        next
    }

    /// Copy of this state with `id` active again, in configured position.
    pub(crate) fn with_activated(
        &self,
        role: BackendRole,
        id: &BackendId,
        group: &DatabaseGroup,
    ) -> Self {
        let mut next = self.clone();
        let configured = match role {
            BackendRole::Primary => &group.primaries,
            BackendRole::Replica => &group.replicas,
        };
        let (active, deactivated) = next.lists_mut(role);
        deactivated.retain(|b| b != id);
        if !active.contains(id) {
            active.push(id.clone());
            active.sort_by_key(|b| configured.iter().position(|c| c == b));
        }
        next
    }

    fn lists_mut(&mut self, role: BackendRole) -> (&mut Vec<BackendId>, &mut Vec<BackendId>) {
        match role {
            BackendRole::Primary => (&mut self.active_primaries, &mut self.deactivated_primaries),
            BackendRole::Replica => (&mut self.active_replicas, &mut self.deactivated_replicas),
        }
    }
}

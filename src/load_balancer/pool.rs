//! Backend pool management.
//!
//! # Responsibilities
//! - Hold the configured logical databases (default plus named ones)
//! - Publish the active/deactivated view shared by every selector
//! - Answer membership questions (which database owns a backend)

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::RouterConfig;
use crate::load_balancer::backend::{
    BackendId, BackendRole, DatabaseGroup, GroupState, DEFAULT_DATABASE,
};
use crate::observability::metrics;

type Snapshot = HashMap<String, Arc<GroupState>>;

/// Configured backends and their shared active state.
///
/// The active state is an immutable snapshot swapped atomically on change,
/// so readers never observe a list mid-mutation. Only the failover monitor
/// mutates it.
#[derive(Debug)]
pub struct BackendSet {
    default_backend: BackendId,
    groups: HashMap<String, DatabaseGroup>,
    active: ArcSwap<Snapshot>,
}

impl BackendSet {
    /// Build the set from a validated configuration.
    pub fn from_config(config: &RouterConfig) -> Self {
        let default_backend = BackendId::new(&config.default_backend);

        let primaries = if config.primaries.is_empty() {
            vec![default_backend.clone()]
        } else {
            config.primaries.iter().map(BackendId::new).collect()
        };

        let mut groups = vec![DatabaseGroup {
            name: DEFAULT_DATABASE.to_string(),
            primaries,
            replicas: config.replicas.iter().map(BackendId::new).collect(),
        }];

        for db in &config.databases {
            let primaries = if db.primaries.is_empty() {
                vec![BackendId::new(&db.name)]
            } else {
                db.primaries.iter().map(BackendId::new).collect()
            };
            groups.push(DatabaseGroup {
                name: db.name.clone(),
                primaries,
                replicas: db.replicas.iter().map(BackendId::new).collect(),
            });
        }

        Self::new(default_backend, groups)
    }

    pub fn new(default_backend: BackendId, groups: Vec<DatabaseGroup>) -> Self {
        let snapshot: Snapshot = groups
            .iter()
            .map(|g| (g.name.clone(), Arc::new(GroupState::all_active(g))))
            .collect();
        let groups = groups.into_iter().map(|g| (g.name.clone(), g)).collect();

        Self {
            default_backend,
            groups,
            active: ArcSwap::from_pointee(snapshot),
        }
    }

    /// The unconditional last-resort backend.
    pub fn default_backend(&self) -> &BackendId {
        &self.default_backend
    }

    /// Configured group by name; unknown names resolve to the default database.
    pub fn group(&self, database: Option<&str>) -> Option<&DatabaseGroup> {
        let name = database.unwrap_or(DEFAULT_DATABASE);
        self.groups
            .get(name)
            .or_else(|| self.groups.get(DEFAULT_DATABASE))
    }

    /// Current active view of a group (same fallback rules as [`Self::group`]).
    pub fn state(&self, database: Option<&str>) -> Option<Arc<GroupState>> {
        let group = self.group(database)?;
        self.active.load().get(&group.name).cloned()
    }

    /// Name of the logical database owning `id`.
    pub fn database_of(&self, id: &str) -> Option<&str> {
        self.groups
            .values()
            .find(|g| g.contains(id))
            .map(|g| g.name.as_str())
    }

    /// Two backends may hold related rows only if they serve the same
    /// logical database. Unknown backends are treated as the default one.
    pub fn allow_relation(&self, a: &str, b: &str) -> bool {
        let db_a = self.database_of(a).unwrap_or(DEFAULT_DATABASE);
        let db_b = self.database_of(b).unwrap_or(DEFAULT_DATABASE);
        db_a == db_b
    }

    /// All configured groups (for sweeps and reporting).
    pub fn groups(&self) -> impl Iterator<Item = &DatabaseGroup> {
        self.groups.values()
    }

    /// Every configured backend, including the default one, without duplicates.
    pub fn all_backends(&self) -> Vec<BackendId> {
        let mut all = vec![self.default_backend.clone()];
        for group in self.groups.values() {
            for id in group.primaries.iter().chain(group.replicas.iter()) {
                if !all.contains(id) {
                    all.push(id.clone());
                }
            }
        }
        all
    }

    pub fn deactivate_replica(&self, database: &str, id: &BackendId) -> bool {
        self.transition(database, BackendRole::Replica, id, false)
    }

    pub fn activate_replica(&self, database: &str, id: &BackendId) -> bool {
        self.transition(database, BackendRole::Replica, id, true)
    }

    pub fn deactivate_primary(&self, database: &str, id: &BackendId) -> bool {
        self.transition(database, BackendRole::Primary, id, false)
    }

    pub fn activate_primary(&self, database: &str, id: &BackendId) -> bool {
        self.transition(database, BackendRole::Primary, id, true)
    }

    /// Move `id` between the active and deactivated lists of a group.
    /// Returns true if the backend changed state.
    fn transition(&self, database: &str, role: BackendRole, id: &BackendId, activate: bool) -> bool {
        let Some(group) = self.groups.get(database) else {
            tracing::warn!(database = %database, backend = %id, "Unknown database in backend transition");
            return false;
        };

        let previous = self.active.rcu(|current| {
            let mut next = (**current).clone();
            if let Some(state) = current.get(database) {
                let updated = if activate {
                    state.with_activated(role, id, group)
                } else {
                    state.with_deactivated(role, id)
                };
                next.insert(database.to_string(), Arc::new(updated));
            }
            next
        });

        let was_active = previous
            .get(database)
            .map(|s| s.is_active(role, id.as_str()))
            .unwrap_or(false);
        let changed = was_active != activate;

        if changed {
            if activate {
                tracing::info!(database = %database, backend = %id, role = role.as_str(), "Activate backend");
            } else {
                tracing::info!(database = %database, backend = %id, role = role.as_str(), "Deactivate backend");
            }
            metrics::record_backend_active(id.as_str(), role.as_str(), activate);
        }
        changed
    }
}

//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Reject conflicting primary/replica assignments
//! - Validate value ranges (attempts >= 1, interval > 0, status codes)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::config::schema::RouterConfig;
use crate::load_balancer::backend::DEFAULT_DATABASE;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.default_backend.trim().is_empty() {
        errors.push(ValidationError::new("default_backend", "must not be empty"));
    }
    if config.health.attempts == 0 {
        errors.push(ValidationError::new("health.attempts", "number of attempts must be >= 1"));
    }
    if config.health.read_only_attempts == 0 {
        errors.push(ValidationError::new(
            "health.read_only_attempts",
            "number of attempts must be >= 1",
        ));
    }
    if config.monitor.enabled && config.monitor.interval_ms == 0 {
        errors.push(ValidationError::new("monitor.interval_ms", "must be > 0 when the monitor is enabled"));
    }
    for code in &config.sticky.status_codes {
        if !(100..=599).contains(code) {
            errors.push(ValidationError::new(
                "sticky.status_codes",
                format!("{} is not an HTTP status code", code),
            ));
        }
    }
    for pattern in config.overrides.keys() {
        if pattern.trim().is_empty() {
            errors.push(ValidationError::new("overrides", format!("invalid pattern '{}'", pattern)));
        }
    }

    // Roles: every backend is a primary or a replica of exactly one database.
    let default_primaries = if config.primaries.is_empty() {
        vec![config.default_backend.clone()]
    } else {
        config.primaries.clone()
    };
    let mut groups = vec![(DEFAULT_DATABASE.to_string(), default_primaries, config.replicas.clone())];

    let mut names = HashSet::new();
    for db in &config.databases {
        if db.name == DEFAULT_DATABASE {
            errors.push(ValidationError::new(
                "databases",
                format!("'{}' is reserved for the top-level primaries/replicas", DEFAULT_DATABASE),
            ));
        }
        if !names.insert(db.name.as_str()) {
            errors.push(ValidationError::new("databases", format!("duplicate database '{}'", db.name)));
        }
        let primaries = if db.primaries.is_empty() {
            vec![db.name.clone()]
        } else {
            db.primaries.clone()
        };
        groups.push((db.name.clone(), primaries, db.replicas.clone()));
    }

    let mut primary_of: HashMap<&str, &str> = HashMap::new();
    let mut replica_of: HashMap<&str, &str> = HashMap::new();
    for (db, primaries, replicas) in &groups {
        for p in primaries {
            if let Some(other) = primary_of.insert(p, db) {
                if other != db.as_str() {
                    errors.push(ValidationError::new(
                        "primaries",
                        format!("backend '{}' is a primary of both '{}' and '{}'", p, other, db),
                    ));
                }
            }
        }
        for r in replicas {
            if let Some(other) = replica_of.insert(r, db) {
                let message = if other == db.as_str() {
                    format!("backend '{}' is listed twice as a replica of '{}'", r, db)
                } else {
                    format!("backend '{}' is a replica of both '{}' and '{}'", r, other, db)
                };
                errors.push(ValidationError::new("replicas", message));
            }
        }
    }
    for (backend, db) in &replica_of {
        if let Some(primary_db) = primary_of.get(backend) {
            errors.push(ValidationError::new(
                "replicas",
                format!(
                    "backend '{}' is both a primary of '{}' and a replica of '{}'",
                    backend, primary_db, db
                ),
            ));
        }
    }
    // The default backend is the write-side last resort.
    if let Some(db) = replica_of.get(config.default_backend.as_str()) {
        errors.push(ValidationError::new(
            "default_backend",
            format!("'{}' is a replica of '{}'", config.default_backend, db),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

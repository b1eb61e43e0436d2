//! Per-operation mode overrides.
//!
//! # Responsibilities
//! - Map named operations (route names, handler paths, URL paths) to a forced mode
//! - Match exact names and prefix wildcards (`/admin/*`)
//!
//! # Design Decisions
//! - Exact matches always beat wildcard matches
//! - Among wildcards, the longest prefix wins
//! - No regex: matching is a linear scan over a small table

use std::collections::BTreeMap;

use crate::routing::mode::RoutingMode;

/// A single override pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Exact(String),
    /// Matches any name starting with the prefix (pattern minus trailing `*`).
    Prefix(String),
}

impl Pattern {
    pub fn parse(raw: &str) -> Self {
        match raw.strip_suffix('*') {
            Some(prefix) => Pattern::Prefix(prefix.to_string()),
            None => Pattern::Exact(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Pattern::Exact(s) | Pattern::Prefix(s) => s,
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Pattern::Exact(exact) => exact == name,
            Pattern::Prefix(prefix) => name.starts_with(prefix.as_str()),
        }
    }
}

/// Compiled override table.
#[derive(Debug, Clone, Default)]
pub struct OverrideTable {
    exact: Vec<(Pattern, RoutingMode)>,
    /// Sorted by prefix length, longest first.
    prefixes: Vec<(Pattern, RoutingMode)>,
}

impl OverrideTable {
    pub fn new(overrides: &BTreeMap<String, RoutingMode>) -> Self {
        let mut exact = Vec::new();
        let mut prefixes = Vec::new();

        for (raw, mode) in overrides {
            let pattern = Pattern::parse(raw);
            match pattern {
                Pattern::Exact(_) => exact.push((pattern, *mode)),
                Pattern::Prefix(_) => prefixes.push((pattern, *mode)),
            }
        }
        prefixes.sort_by(|a, b| b.0.as_str().len().cmp(&a.0.as_str().len()));

        Self { exact, prefixes }
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.prefixes.is_empty()
    }

    /// Mode forced for an operation known under any of `names`, or
    /// `requested` when nothing matches.
    pub fn resolve<'a, I>(&self, names: I, requested: RoutingMode) -> RoutingMode
    where
        I: IntoIterator<Item = &'a str>,
    {
        if self.is_empty() {
            return requested;
        }

        let names: Vec<&str> = names.into_iter().collect();

        for (pattern, mode) in &self.exact {
            if names.iter().any(|n| pattern.matches(n)) {
                tracing::debug!(pattern = pattern.as_str(), mode = %mode, "Exact mode override");
                return *mode;
            }
        }

        for (pattern, mode) in &self.prefixes {
            if names.iter().any(|n| pattern.matches(n)) {
                tracing::debug!(pattern = pattern.as_str(), mode = %mode, "Wildcard mode override");
                return *mode;
            }
        }

        requested
    }
}

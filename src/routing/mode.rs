//! Routing mode of a unit of work.

use std::fmt;
use std::str::FromStr;

use http::Method;
use serde::{Deserialize, Serialize};

/// Which class of backend the current unit of work is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    /// Writable backend. Also the default for an empty stack.
    #[default]
    #[serde(alias = "master")]
    Primary,
    /// Read-only backend.
    #[serde(alias = "slave")]
    Replica,
}

impl RoutingMode {
    /// Default mode for an incoming request.
    ///
    /// `GET` and `HEAD` are expected not to write, everything else goes to
    /// the primary.
    pub fn for_method(method: &Method) -> Self {
        if method == Method::GET || method == Method::HEAD {
            RoutingMode::Replica
        } else {
            RoutingMode::Primary
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingMode::Primary => "primary",
            RoutingMode::Replica => "replica",
        }
    }
}

impl fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognised mode name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown routing mode '{0}'")]
pub struct ParseModeError(pub String);

impl FromStr for RoutingMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "primary" | "master" => Ok(RoutingMode::Primary),
            "replica" | "slave" => Ok(RoutingMode::Replica),
            _ => Err(ParseModeError(s.to_string())),
        }
    }
}

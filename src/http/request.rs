//! Request side of the dispatcher boundary.
//!
//! # Responsibilities
//! - Capture what routing needs from a request (method, path, headers)
//! - Carry the handler names the override table matches against
//! - Look up cookies without a cookie-jar dependency

use http::header::COOKIE;
use http::request::Parts;
use http::{HeaderMap, Method};

/// Description of one incoming unit of work.
#[derive(Debug, Clone)]
pub struct UnitDescriptor {
    pub method: Method,
    pub path: String,
    /// Route names or handler paths known for this request, in addition
    /// to the path itself.
    pub names: Vec<String>,
    pub headers: HeaderMap,
}

impl UnitDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            names: Vec::new(),
            headers: HeaderMap::new(),
        }
    }

    pub fn from_parts(parts: &Parts) -> Self {
        Self {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            names: Vec::new(),
            headers: parts.headers.clone(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    pub fn with_header(mut self, name: http::header::HeaderName, value: http::HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Every name the operation is known by: its path first, then handler names.
    pub fn operation_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.path.as_str()).chain(self.names.iter().map(String::as_str))
    }

    /// Value of the first cookie called `name` across all `Cookie` headers.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| k.trim() == name)
            .map(|(_, v)| v.trim().trim_matches('"'))
    }

    /// Header value as text, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

//! HTTP dispatcher boundary.
//!
//! # Data Flow
//! ```text
//! Incoming request parts (method, path, headers) + handler names
//!     → request.rs (UnitDescriptor, cookie lookup)
//!     → dispatcher.rs (base mode: method → overrides → sticky cookie → header)
//!     → ExecutionContext handed to the application
//!     → [application resolves backends through the router]
//!     → dispatcher.rs (exit: final mode + response status)
//!     → response.rs (set or expire the sticky marker cookie)
//! ```
//!
//! # Design Decisions
//! - Transport agnostic: works on `http` crate types, no server framework
//! - The host owns the request lifecycle; this module only brackets it

pub mod dispatcher;
pub mod request;
pub mod response;

pub use dispatcher::Dispatcher;
pub use request::UnitDescriptor;

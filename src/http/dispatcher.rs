//! Opens and closes routing contexts around requests.
//!
//! # Responsibilities
//! - Pick the base mode of a request
//! - Hand out a fresh [`ExecutionContext`] per request
//! - Set the read-after-write marker on the way out
//!
//! # Design Decisions
//! - Mode precedence, lowest to highest: request method, override table,
//!   sticky marker cookie (forces primary), forced-state header
//! - An unparseable forced-state header is ignored, not rejected

use std::sync::Arc;

use http::{HeaderMap, StatusCode};

use crate::config::schema::StickyConfig;
use crate::error::RoutingResult;
use crate::http::request::UnitDescriptor;
use crate::http::response::{append_set_cookie, expired_cookie, marker_cookie};
use crate::routing::context::ExecutionContext;
use crate::routing::matcher::OverrideTable;
use crate::routing::mode::RoutingMode;
use crate::routing::router::ReplicationRouter;

#[derive(Debug, Clone)]
pub struct Dispatcher {
    router: Arc<ReplicationRouter>,
    overrides: OverrideTable,
    sticky: StickyConfig,
}

impl Dispatcher {
    pub fn new(router: Arc<ReplicationRouter>) -> Self {
        let overrides = OverrideTable::new(&router.config().overrides);
        let sticky = router.config().sticky.clone();
        Self {
            router,
            overrides,
            sticky,
        }
    }

    pub fn router(&self) -> &Arc<ReplicationRouter> {
        &self.router
    }

    /// Base routing mode for `unit`.
    pub fn initial_mode(&self, unit: &UnitDescriptor) -> RoutingMode {
        let mut mode = RoutingMode::for_method(&unit.method);
        mode = self.overrides.resolve(unit.operation_names(), mode);

        if unit.cookie(&self.sticky.cookie_name) == Some("true") {
            tracing::debug!(path = %unit.path, "Sticky marker present, forcing primary");
            mode = RoutingMode::Primary;
        }

        if let Some(raw) = unit.header(&self.sticky.force_state_header) {
            match raw.parse::<RoutingMode>() {
                Ok(forced) => mode = forced,
                Err(e) => tracing::warn!(path = %unit.path, error = %e, "Ignoring forced-state header"),
            }
        }
        mode
    }

    /// Open the routing context for `unit`.
    pub fn enter(&self, unit: &UnitDescriptor) -> ExecutionContext {
        let mode = self.initial_mode(unit);
        let cx = ExecutionContext::enter(mode);
        tracing::debug!(
            unit_id = %cx.unit_id(),
            method = %unit.method,
            path = %unit.path,
            mode = %mode,
            "Request routed"
        );
        cx
    }

    /// Close the routing context, updating the sticky marker on `response`.
    ///
    /// The marker is set when the unit ended in primary mode with one of
    /// the configured statuses; otherwise an existing marker is expired.
    pub fn exit(
        &self,
        cx: ExecutionContext,
        unit: &UnitDescriptor,
        status: StatusCode,
        response: &mut HeaderMap,
    ) -> RoutingMode {
        let mode = cx.exit();
        let name = &self.sticky.cookie_name;

        if mode == RoutingMode::Primary && self.sticky.status_codes.contains(&status.as_u16()) {
            append_set_cookie(response, marker_cookie(name, self.sticky.max_age_secs));
        } else if unit.cookie(name).is_some() {
            append_set_cookie(response, expired_cookie(name));
        }
        mode
    }

    /// Whether the service should present itself as read-only right now.
    pub fn is_service_read_only(&self, cx: &mut ExecutionContext) -> RoutingResult<bool> {
        self.router.is_service_read_only(cx)
    }
}

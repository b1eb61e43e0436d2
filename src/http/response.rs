//! Response side of the dispatcher boundary.
//!
//! # Responsibilities
//! - Build the sticky marker `Set-Cookie` value
//! - Build the expiring `Set-Cookie` value that clears it

use http::header::{InvalidHeaderValue, SET_COOKIE};
use http::{HeaderMap, HeaderValue};

/// `Set-Cookie` value marking a client as having just written.
pub fn marker_cookie(name: &str, max_age_secs: u64) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!("{name}=true; Max-Age={max_age_secs}; Path=/"))
}

/// `Set-Cookie` value deleting the marker.
pub fn expired_cookie(name: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!(
        "{name}=; Max-Age=0; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT"
    ))
}

/// Append a `Set-Cookie` header, logging instead of failing on a bad value.
pub(crate) fn append_set_cookie(
    headers: &mut HeaderMap,
    value: Result<HeaderValue, InvalidHeaderValue>,
) {
    match value {
        Ok(v) => {
            headers.append(SET_COOKIE, v);
        }
        Err(e) => tracing::error!(error = %e, "Invalid sticky cookie value"),
    }
}

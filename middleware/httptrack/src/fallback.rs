//! Ready-made fallbacks for `Rule::with_fallback`.
//!
//! ```rust
//! # use gotham_middleware_httptrack::{fallback, Location, Rule};
//! let rule = Rule::new(Location::Header, "x-tracking-id", Location::Header, "x-tracking-id")
//!     .with_fallback(fallback::generate_id);
//! # let _ = rule;
//! ```

use uuid::Uuid;

use crate::inbound::InboundRequest;

/// Generates a fresh v4 UUID.
///
/// Fallbacks run once per inbound request, so every outbound request made while handling it
/// shares the generated id.
pub fn generate_id(_name: &str, _inbound: &InboundRequest<'_>) -> String {
    Uuid::new_v4().to_string()
}

/// Reuses the Gotham request id, which Gotham takes from an inbound `X-Request-ID` header or
/// generates itself.
///
/// Produces nothing for requests viewed outside of Gotham.
pub fn request_id(_name: &str, inbound: &InboundRequest<'_>) -> String {
    inbound.request_id().map(str::to_owned).unwrap_or_default()
}

/// Always yields `value`.
pub fn constant(value: &str) -> impl Fn(&str, &InboundRequest<'_>) -> String + Clone {
    let value = value.to_owned();
    move |_, _| value.clone()
}

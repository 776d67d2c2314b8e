//! Propagates tracking values, such as correlation ids, session ids or tenant keys, from the
//! requests a Gotham application receives to the requests it makes to other services.
//!
//! A table of `Rule`s says where each value is read on the inbound request (a header, a cookie
//! or a query parameter) and where it is written on outbound requests. The rules are resolved
//! once per inbound request, by `TrackingMiddleware` or by a handler wrapped with `install`, into
//! an immutable `Carrier` stored in the request `State`. Outbound requests built with
//! `new_outbound_request`, `get` or `post` then receive every tracked value.
//!
//! A rule may carry a fallback which produces a value when the inbound request has none, e.g.
//! `fallback::generate_id` to start a new correlation id at the edge of the system.
#![warn(missing_docs, deprecated)]

mod apply;
mod bind;
mod carrier;
mod client;
mod error;
pub mod fallback;
mod inbound;
mod middleware;
mod query;
mod rule;

pub use self::apply::apply;
pub use self::bind::bind;
pub use self::carrier::{Carrier, TrackedValue, TrackingContext};
pub use self::client::{get, get_with, new_outbound_request, post, post_with, ResponseFuture};
pub use self::error::{Error, Result};
pub use self::inbound::InboundRequest;
pub use self::middleware::{install, Tracked, TrackingMiddleware};
pub use self::rule::{Fallback, Location, Rule};

//! Defines the rule table mapping inbound locations to outbound locations.

use std::fmt;
use std::panic::RefUnwindSafe;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::inbound::InboundRequest;

/// Where a tracked value is read from, or written to, on an HTTP request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    /// An HTTP header.
    Header,
    /// A cookie from the `Cookie` header.
    Cookie,
    /// A parameter in the URI query string.
    QueryParameter,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Location::Header => "header",
            Location::Cookie => "cookie",
            Location::QueryParameter => "query parameter",
        };
        f.write_str(s)
    }
}

/// Synthesizes a value when the inbound request does not carry one.
///
/// The function receives the outbound name of the rule and a read-only view of the inbound
/// request. It is called at most once per inbound request, so it can generate a random tracking
/// id and every outbound request made while handling that inbound request will share it.
/// Returning an empty string means "do not propagate anything for this rule".
pub type Fallback = Arc<dyn Fn(&str, &InboundRequest<'_>) -> String + Send + Sync + RefUnwindSafe>;

/// When a value is found in `inbound_location` named `inbound_name`, set
/// `outbound_location`.`outbound_name` to that value for all outbound requests.
///
/// Commonly you'd see something like:
///
/// ```rust
/// # use gotham_middleware_httptrack::{Location, Rule};
/// Rule::new(Location::Cookie, "session-id", Location::Header, "x-client-session-id");
/// ```
///
/// or, between services which share a header:
///
/// ```rust
/// # use gotham_middleware_httptrack::{Location, Rule};
/// Rule::new(Location::Header, "x-track", Location::Header, "x-track");
/// ```
///
/// Rule tables can be loaded from configuration with `serde`; fallbacks can only be attached in
/// code.
#[derive(Clone, Serialize, Deserialize)]
pub struct Rule {
    inbound_location: Location,
    inbound_name: String,
    outbound_location: Location,
    outbound_name: String,
    #[serde(skip)]
    fallback: Option<Fallback>,
}

impl Rule {
    /// Creates a rule with no fallback.
    pub fn new<I, O>(
        inbound_location: Location,
        inbound_name: I,
        outbound_location: Location,
        outbound_name: O,
    ) -> Self
    where
        I: Into<String>,
        O: Into<String>,
    {
        Rule {
            inbound_location,
            inbound_name: inbound_name.into(),
            outbound_location,
            outbound_name: outbound_name.into(),
            fallback: None,
        }
    }

    /// Attaches a fallback used when the inbound value is absent or empty.
    pub fn with_fallback<F>(self, fallback: F) -> Self
    where
        F: Fn(&str, &InboundRequest<'_>) -> String + Send + Sync + RefUnwindSafe + 'static,
    {
        Rule {
            fallback: Some(Arc::new(fallback)),
            ..self
        }
    }

    /// Where the value is read from on the inbound request.
    pub fn inbound_location(&self) -> Location {
        self.inbound_location
    }

    /// The name of the inbound header, cookie or query parameter.
    pub fn inbound_name(&self) -> &str {
        &self.inbound_name
    }

    /// Where the value is written to on outbound requests.
    pub fn outbound_location(&self) -> Location {
        self.outbound_location
    }

    /// The name of the outbound header, cookie or query parameter.
    pub fn outbound_name(&self) -> &str {
        &self.outbound_name
    }

    /// The configured fallback, if any.
    pub fn fallback(&self) -> Option<&Fallback> {
        self.fallback.as_ref()
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("inbound_location", &self.inbound_location)
            .field("inbound_name", &self.inbound_name)
            .field("outbound_location", &self.outbound_location)
            .field("outbound_name", &self.outbound_name)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

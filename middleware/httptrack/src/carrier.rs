//! Defines the per-request `Carrier` of resolved tracked values.

use std::sync::Arc;

use gotham::state::{FromState, State, StateData};
use hyper::Request;

use crate::rule::Location;

/// A resolved value waiting to be written to outbound requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackedValue {
    location: Location,
    name: String,
    value: String,
}

impl TrackedValue {
    /// Creates a tracked value for the given outbound location and name.
    pub fn new<N, V>(location: Location, name: N, value: V) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        TrackedValue {
            location,
            name: name.into(),
            value: value.into(),
        }
    }

    /// Where the value is written on outbound requests.
    pub fn location(&self) -> Location {
        self.location
    }

    /// The outbound header, cookie or query parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value itself.
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// The immutable snapshot of tracked values resolved for one inbound request.
///
/// A `Carrier` is created once when the inbound request enters the application and is stored in
/// the request `State`. It is never modified afterwards; cloning it only bumps a reference count,
/// so it can be moved into spawned tasks that make outbound calls on behalf of the request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Carrier {
    values: Arc<[TrackedValue]>,
}

impl StateData for Carrier {}

impl Default for Carrier {
    fn default() -> Self {
        Carrier::new(Vec::new())
    }
}

impl Carrier {
    /// Seals the resolved values, keeping their order.
    pub fn new(values: Vec<TrackedValue>) -> Self {
        Carrier {
            values: values.into(),
        }
    }

    /// The tracked values, in rule order.
    pub fn values(&self) -> &[TrackedValue] {
        &self.values
    }

    /// Returns `true` when no rule produced a value.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The number of tracked values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Stores a clone of this carrier in the extensions of an outbound request, where `apply`
    /// looks for it.
    pub fn attach<B>(&self, request: &mut Request<B>) {
        request.extensions_mut().insert(self.clone());
    }
}

/// A request-scoped context that may hold a `Carrier`.
///
/// Implemented for the Gotham `State` of a tracked request, and for a `Carrier` that was cloned
/// out of it, so outbound requests can be built wherever handling code ends up.
pub trait TrackingContext {
    /// The carrier, if this context was derived from a tracked inbound request.
    fn carrier(&self) -> Option<&Carrier>;
}

impl TrackingContext for State {
    fn carrier(&self) -> Option<&Carrier> {
        Carrier::try_borrow_from(self)
    }
}

impl TrackingContext for Carrier {
    fn carrier(&self) -> Option<&Carrier> {
        Some(self)
    }
}

impl<T: TrackingContext> TrackingContext for Option<T> {
    fn carrier(&self) -> Option<&Carrier> {
        self.as_ref().and_then(|t| t.carrier())
    }
}

impl<T: TrackingContext + ?Sized> TrackingContext for &T {
    fn carrier(&self) -> Option<&Carrier> {
        (**self).carrier()
    }
}

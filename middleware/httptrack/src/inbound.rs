//! A read-only view of the inbound request, as seen by the binder and by fallbacks.

use std::borrow::Cow;

use cookie::Cookie;
use gotham::state::{request_id, FromState, State};
use hyper::header::{HeaderMap, HeaderValue, COOKIE};
use hyper::{Method, Uri};

use crate::query;
use crate::rule::Location;

/// Borrowed view of the parts of an inbound request that tracked values are read from.
///
/// Fallbacks receive this view rather than the `State`, so they can inspect the request without
/// being able to alter it.
#[derive(Clone, Copy, Debug)]
pub struct InboundRequest<'a> {
    method: &'a Method,
    uri: &'a Uri,
    headers: &'a HeaderMap,
    request_id: Option<&'a str>,
}

impl<'a> InboundRequest<'a> {
    /// Creates a view from the individual request parts.
    pub fn new(method: &'a Method, uri: &'a Uri, headers: &'a HeaderMap) -> Self {
        InboundRequest {
            method,
            uri,
            headers,
            request_id: None,
        }
    }

    /// Creates a view of the request held by a Gotham `State`.
    pub fn from_state(state: &'a State) -> Self {
        InboundRequest {
            method: Method::borrow_from(state),
            uri: Uri::borrow_from(state),
            headers: HeaderMap::borrow_from(state),
            request_id: Some(request_id(state)),
        }
    }

    /// The request method.
    pub fn method(&self) -> &'a Method {
        self.method
    }

    /// The request URI.
    pub fn uri(&self) -> &'a Uri {
        self.uri
    }

    /// All request headers.
    pub fn headers(&self) -> &'a HeaderMap {
        self.headers
    }

    /// The Gotham request id, when the view was built from a `State`.
    pub fn request_id(&self) -> Option<&'a str> {
        self.request_id
    }

    /// The first value of the named header.
    ///
    /// Bytes which are not valid UTF-8 are replaced with `U+FFFD`.
    pub fn header(&self, name: &str) -> Option<Cow<'a, str>> {
        self.headers.get(name).map(text)
    }

    /// The value of the first cookie with the given name, across all `Cookie` headers.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.headers.get_all(COOKIE).iter().map(text).find_map(|cs| {
            cs.split(';')
                .flat_map(|c| Cookie::parse(c.trim()))
                .find(|cookie| cookie.name() == name)
                .map(|cookie| cookie.value().to_owned())
        })
    }

    /// The first decoded value of the named query string parameter.
    pub fn query(&self, name: &str) -> Option<String> {
        query::first(self.uri.query(), name)
    }

    /// Reads `name` from `location`.
    ///
    /// An empty value is reported as absent.
    pub fn lookup(&self, location: Location, name: &str) -> Option<String> {
        let value = match location {
            Location::Header => self.header(name).map(Cow::into_owned),
            Location::Cookie => self.cookie(name),
            Location::QueryParameter => self.query(name),
        };

        value.filter(|v| !v.is_empty())
    }
}

fn text(value: &HeaderValue) -> Cow<'_, str> {
    String::from_utf8_lossy(value.as_bytes())
}

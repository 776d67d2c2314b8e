//! Writes the tracked values of a `Carrier` onto an outbound request.

use hyper::header::{HeaderMap, HeaderName, HeaderValue, COOKIE};
use hyper::http::uri::PathAndQuery;
use hyper::{Request, Uri};

use crate::carrier::{Carrier, TrackedValue};
use crate::error::{Error, Result};
use crate::query;
use crate::rule::Location;

/// Adds the tracked headers, cookies and query parameters to an outbound request.
///
/// The `Carrier` is read from the request extensions, where `Carrier::attach` and
/// `new_outbound_request` put it. Values are appended in rule order; existing headers, cookies
/// and query parameters are never removed or overwritten, so calling this twice on the same
/// request duplicates every value.
///
/// Each tracked cookie is written as exactly one cookie: bytes a cookie value cannot hold, such
/// as `;`, are dropped, and a value containing a space or a comma is quoted.
///
/// # Errors
///
/// * `Error::MissingCarrier` when the request has no carrier. Nothing is written. You probably
///   want `new_outbound_request` instead, which ignores this case, unless you need to know that
///   the tracking context was lost.
/// * `Error::InvalidRequest` when a value cannot be written, e.g. a query parameter target on a
///   request whose URI is in authority form. Every value is checked before anything is written,
///   so the request is left untouched.
pub fn apply<B>(request: &mut Request<B>) -> Result<()> {
    let carrier = request
        .extensions()
        .get::<Carrier>()
        .cloned()
        .ok_or(Error::MissingCarrier)?;

    let plan = Plan::new(&carrier, request.uri(), request.headers())?;
    plan.write(request);
    Ok(())
}

/// The validated writes for one request.
#[derive(Default)]
struct Plan {
    headers: Vec<(HeaderName, HeaderValue)>,
    cookie: Option<HeaderValue>,
    uri: Option<Uri>,
}

impl Plan {
    fn new(carrier: &Carrier, uri: &Uri, headers: &HeaderMap) -> Result<Self> {
        let mut plan = Plan::default();
        let mut cookies: Vec<String> = Vec::new();
        let mut query_values: Vec<&TrackedValue> = Vec::new();

        for tracked in carrier.values() {
            match tracked.location() {
                Location::Header => plan.headers.push(header(tracked)?),
                Location::Cookie => cookies.push(cookie(tracked)?),
                Location::QueryParameter => query_values.push(tracked),
            }
        }

        if !query_values.is_empty() {
            plan.uri = Some(with_query_values(uri, &query_values)?);
        }

        if !cookies.is_empty() {
            plan.cookie = Some(with_cookies(headers, &cookies)?);
        }

        Ok(plan)
    }

    fn write<B>(self, request: &mut Request<B>) {
        if let Some(uri) = self.uri {
            *request.uri_mut() = uri;
        }

        let headers = request.headers_mut();
        for (name, value) in self.headers {
            headers.append(name, value);
        }

        if let Some(cookie) = self.cookie {
            headers.insert(COOKIE, cookie);
        }
    }
}

fn header(tracked: &TrackedValue) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::from_bytes(tracked.name().as_bytes()).map_err(|_| {
        Error::InvalidRequest(format!("`{}` is not a valid header name", tracked.name()))
    })?;
    let value = HeaderValue::from_bytes(tracked.value().as_bytes()).map_err(|_| {
        Error::InvalidRequest(format!(
            "value tracked for header `{}` is not a valid header value",
            tracked.name()
        ))
    })?;
    Ok((name, value))
}

/// Formats a tracked cookie as a single `name=value` pair.
fn cookie(tracked: &TrackedValue) -> Result<String> {
    let name = tracked.name();
    if name.is_empty() || !name.bytes().all(is_token) {
        return Err(Error::InvalidRequest(format!(
            "`{}` is not a valid cookie name",
            name
        )));
    }

    let value: String = tracked
        .value()
        .chars()
        .filter(|&c| is_cookie_octet(c))
        .collect();

    if value.contains(' ') || value.contains(',') {
        Ok(format!("{}=\"{}\"", name, value))
    } else {
        Ok(format!("{}={}", name, value))
    }
}

fn is_token(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

fn is_cookie_octet(c: char) -> bool {
    (' '..='~').contains(&c) && c != '"' && c != ';' && c != '\\'
}

/// Joins the existing `Cookie` headers and the tracked cookies into one header value.
fn with_cookies(headers: &HeaderMap, cookies: &[String]) -> Result<HeaderValue> {
    let joined = headers
        .get_all(COOKIE)
        .iter()
        .map(HeaderValue::as_bytes)
        .filter(|v| !v.is_empty())
        .chain(cookies.iter().map(String::as_bytes))
        .collect::<Vec<_>>()
        .join(&b"; "[..]);

    HeaderValue::from_bytes(&joined)
        .map_err(|_| Error::InvalidRequest("existing Cookie header is not valid".to_owned()))
}

fn with_query_values(uri: &Uri, values: &[&TrackedValue]) -> Result<Uri> {
    let carries_path = !(uri.scheme().is_none() && uri.authority().is_some()) && uri.path() != "*";
    if !carries_path {
        return Err(Error::InvalidRequest(format!(
            "request URI `{}` has no path to carry query parameters",
            uri
        )));
    }

    let mut mapping = query::split(uri.query());
    for tracked in values {
        mapping
            .entry(tracked.name().as_bytes().to_vec())
            .or_insert_with(Vec::new)
            .push(tracked.value().as_bytes().to_vec());
    }

    let path_and_query = format!("{}?{}", uri.path(), query::encode(&mapping));
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(
        path_and_query
            .parse::<PathAndQuery>()
            .map_err(|e| Error::Http(e.into()))?,
    );
    Uri::from_parts(parts).map_err(|e| Error::Http(e.into()))
}

//! Outbound request helpers which carry tracked values along.
//!
//! Because handlers pass `State` (or a cloned `Carrier`) around anyway, building outbound
//! requests through these helpers is enough to propagate the tracked values:
//!
//! ```rust,no_run
//! # use gotham::state::State;
//! # use gotham_middleware_httptrack::get;
//! # async fn call(state: &State) -> gotham_middleware_httptrack::Result<()> {
//! // The x-tracking-id header value from the inbound request is set for this request too.
//! let response = get(state, "http://microservice1.example.com/serviceCall").await?;
//! # let _ = response;
//! # Ok(())
//! # }
//! ```

use std::convert::TryFrom;
use std::future::Future;
use std::pin::Pin;

use futures_util::future::FutureExt;
use hyper::client::connect::Connect;
use hyper::client::{Client, HttpConnector};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response, Uri};
use log::trace;

use crate::apply::apply;
use crate::carrier::TrackingContext;
use crate::error::{Error, Result};

/// The future returned by `get` and `post`.
///
/// It owns the prepared request, so it can be awaited after the `State` it was built from has
/// been borrowed elsewhere.
pub type ResponseFuture = Pin<Box<dyn Future<Output = Result<Response<Body>>> + Send>>;

/// Creates a new outbound request carrying the tracked values of `ctx`.
///
/// When `ctx` holds no carrier, e.g. a `State` that never passed through the tracking
/// middleware, the request is returned as built, without any tracked values. Any other failure
/// while applying the values is returned.
pub fn new_outbound_request<T, U, B>(
    ctx: &T,
    method: Method,
    uri: U,
    body: B,
) -> Result<Request<Body>>
where
    T: TrackingContext + ?Sized,
    Uri: TryFrom<U>,
    <Uri as TryFrom<U>>::Error: Into<hyper::http::Error>,
    B: Into<Body>,
{
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .body(body.into())?;

    if let Some(carrier) = ctx.carrier() {
        carrier.attach(&mut request);
    }

    match apply(&mut request) {
        Ok(()) => Ok(request),
        Err(Error::MissingCarrier) => {
            trace!("no tracking carrier for outbound request to {}", request.uri());
            Ok(request)
        }
        Err(e) => Err(e),
    }
}

/// Issues a tracked GET request with a default client.
pub fn get<T, U>(ctx: &T, uri: U) -> ResponseFuture
where
    T: TrackingContext + ?Sized,
    Uri: TryFrom<U>,
    <Uri as TryFrom<U>>::Error: Into<hyper::http::Error>,
{
    get_with(&default_client(), ctx, uri)
}

/// Issues a tracked GET request with the given client.
pub fn get_with<C, T, U>(client: &Client<C, Body>, ctx: &T, uri: U) -> ResponseFuture
where
    C: Connect + Clone + Send + Sync + 'static,
    T: TrackingContext + ?Sized,
    Uri: TryFrom<U>,
    <Uri as TryFrom<U>>::Error: Into<hyper::http::Error>,
{
    let request = new_outbound_request(ctx, Method::GET, uri, Body::empty());
    send(client.clone(), request)
}

/// Issues a tracked POST request with a default client.
pub fn post<T, U, B>(ctx: &T, uri: U, content_type: &str, body: B) -> ResponseFuture
where
    T: TrackingContext + ?Sized,
    Uri: TryFrom<U>,
    <Uri as TryFrom<U>>::Error: Into<hyper::http::Error>,
    B: Into<Body>,
{
    post_with(&default_client(), ctx, uri, content_type, body)
}

/// Issues a tracked POST request with the given client.
pub fn post_with<C, T, U, B>(
    client: &Client<C, Body>,
    ctx: &T,
    uri: U,
    content_type: &str,
    body: B,
) -> ResponseFuture
where
    C: Connect + Clone + Send + Sync + 'static,
    T: TrackingContext + ?Sized,
    Uri: TryFrom<U>,
    <Uri as TryFrom<U>>::Error: Into<hyper::http::Error>,
    B: Into<Body>,
{
    let request = new_outbound_request(ctx, Method::POST, uri, body).and_then(|mut request| {
        let value = HeaderValue::from_str(content_type).map_err(|_| {
            Error::InvalidRequest(format!("`{}` is not a valid content type", content_type))
        })?;
        request.headers_mut().append(CONTENT_TYPE, value);
        Ok(request)
    });
    send(client.clone(), request)
}

fn default_client() -> Client<HttpConnector, Body> {
    Client::new()
}

fn send<C>(client: Client<C, Body>, request: Result<Request<Body>>) -> ResponseFuture
where
    C: Connect + Clone + Send + Sync + 'static,
{
    async move {
        let request = request?;
        let response = client.request(request).await?;
        Ok::<_, Error>(response)
    }
    .boxed()
}

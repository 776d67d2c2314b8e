//! Gotham entry points which resolve the tracked values of each inbound request.

use std::pin::Pin;
use std::sync::Arc;

use gotham::handler::{Handler, HandlerFuture, NewHandler};
use gotham::middleware::{Middleware, NewMiddleware};
use gotham::state::{request_id, State};
use log::trace;

use crate::bind::bind;
use crate::carrier::Carrier;
use crate::inbound::InboundRequest;
use crate::rule::Rule;

/// Resolves the rules against the request in `state` and stores the resulting `Carrier`.
fn seal(state: &mut State, rules: &[Rule]) {
    let carrier = {
        let inbound = InboundRequest::from_state(state);
        Carrier::new(bind(&inbound, rules))
    };

    trace!(
        "[{}] sealed {} tracked value(s) from {} rule(s)",
        request_id(state),
        carrier.len(),
        rules.len()
    );
    state.put(carrier);
}

/// Captures tracked values from each inbound request, so that outbound requests built from the
/// request `State` carry them along.
///
/// The rules are resolved once per request, before the rest of the pipeline runs; the response is
/// passed back untouched.
///
/// Example:
/// ```rust
/// use gotham::hyper::{Body, Response, StatusCode};
/// use gotham::helpers::http::response::create_empty_response;
/// use gotham::pipeline::{new_pipeline, single_pipeline};
/// use gotham::router::{builder::*, Router};
/// use gotham::state::State;
/// use gotham_middleware_httptrack::{Location, Rule, TrackingMiddleware};
///
/// fn handler(state: State) -> (State, Response<Body>) {
///     let res = create_empty_response(&state, StatusCode::OK);
///     (state, res)
/// }
///
/// fn router() -> Router {
///     let (chain, pipelines) = single_pipeline(
///         new_pipeline()
///             .add(TrackingMiddleware::new(vec![
///                 Rule::new(Location::Header, "x-tracking-id", Location::Header, "x-tracking-id"),
///                 Rule::new(Location::Cookie, "session-id", Location::Header, "x-client-session-id"),
///             ]))
///             .build(),
///     );
///
///     build_router(chain, pipelines, |route| {
///         route.get("/api").to(handler);
///     })
/// }
///
/// # fn main() {
/// #    let _ = router();
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct TrackingMiddleware {
    rules: Arc<[Rule]>,
}

impl TrackingMiddleware {
    /// Creates a middleware resolving `rules`, in order, for every request.
    pub fn new(rules: Vec<Rule>) -> Self {
        TrackingMiddleware {
            rules: rules.into(),
        }
    }

    /// The configured rules.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

/// `Middleware` trait implementation.
impl Middleware for TrackingMiddleware {
    /// Attaches the resolved `Carrier` to the request state.
    fn call<Chain>(self, mut state: State, chain: Chain) -> Pin<Box<HandlerFuture>>
    where
        Chain: FnOnce(State) -> Pin<Box<HandlerFuture>>,
    {
        seal(&mut state, &self.rules);
        chain(state)
    }
}

/// `NewMiddleware` trait implementation.
impl NewMiddleware for TrackingMiddleware {
    type Instance = Self;

    /// Clones the current middleware to a new instance.
    fn new_middleware(&self) -> anyhow::Result<Self::Instance> {
        Ok(self.clone())
    }
}

/// A handler wrapped by `install`.
#[derive(Clone, Debug)]
pub struct Tracked<H> {
    inner: H,
    rules: Arc<[Rule]>,
}

/// Wraps a handler, typically a whole `Router`, so that every request it serves has its tracked
/// values captured first.
///
/// This is the counterpart of `TrackingMiddleware` for applications that do not use pipelines:
///
/// ```rust,no_run
/// # use gotham::router::builder::*;
/// # use gotham::state::State;
/// # use gotham_middleware_httptrack::{install, Location, Rule};
/// # fn handler(state: State) -> (State, &'static str) { (state, "ok") }
/// let router = build_simple_router(|route| {
///     route.get("/api").to(handler);
/// });
/// let handler = install(
///     router,
///     vec![Rule::new(Location::Header, "x-tracking-id", Location::Header, "x-tracking-id")],
/// );
/// gotham::start("127.0.0.1:7878", handler).unwrap();
/// ```
pub fn install<NH>(new_handler: NH, rules: Vec<Rule>) -> Tracked<NH>
where
    NH: NewHandler,
{
    Tracked {
        inner: new_handler,
        rules: rules.into(),
    }
}

impl<NH> NewHandler for Tracked<NH>
where
    NH: NewHandler,
{
    type Instance = Tracked<NH::Instance>;

    fn new_handler(&self) -> anyhow::Result<Self::Instance> {
        Ok(Tracked {
            inner: self.inner.new_handler()?,
            rules: self.rules.clone(),
        })
    }
}

impl<H> Handler for Tracked<H>
where
    H: Handler,
{
    fn handle(self, mut state: State) -> Pin<Box<HandlerFuture>> {
        seal(&mut state, &self.rules);
        self.inner.handle(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::apply;
    use crate::client::new_outbound_request;
    use crate::fallback;
    use crate::rule::Location;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use gotham::helpers::http::response::create_empty_response;
    use gotham::hyper::header::{HeaderValue, COOKIE};
    use gotham::hyper::{Body, Method, Response, StatusCode};
    use gotham::pipeline::{new_pipeline, single_pipeline};
    use gotham::router::builder::*;
    use gotham::router::Router;
    use gotham::state::FromState;
    use gotham::test::TestServer;

    static FALLBACK_CALLS: AtomicUsize = AtomicUsize::new(0);

    /// Builds an outbound request from the state and reflects it in the response: its headers are
    /// copied over, and its URI is returned in `x-outbound-uri`.
    fn outbound(state: State) -> (State, Response<Body>) {
        let outbound = new_outbound_request(&state, Method::GET, "/downstream", Body::empty());
        let mut res = create_empty_response(&state, StatusCode::OK);

        match outbound {
            Ok(outbound) => {
                let headers = res.headers_mut();
                for (name, value) in outbound.headers() {
                    headers.append(name, value.clone());
                }
                headers.insert(
                    "x-outbound-uri",
                    HeaderValue::from_str(&outbound.uri().to_string()).unwrap(),
                );
            }
            Err(_) => *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR,
        }

        (state, res)
    }

    /// Builds two outbound requests and reports whether they carry the same tracking id.
    fn outbound_twice(state: State) -> (State, Response<Body>) {
        let first = new_outbound_request(&state, Method::GET, "/one", Body::empty()).unwrap();
        let second = new_outbound_request(&state, Method::GET, "/two", Body::empty()).unwrap();
        let status = if first.headers()["x-tracking-id"] == second.headers()["x-tracking-id"] {
            StatusCode::OK
        } else {
            StatusCode::CONFLICT
        };
        let res = create_empty_response(&state, status);
        (state, res)
    }

    /// Applies directly to a request built without going through `new_outbound_request`.
    fn direct_apply(state: State) -> (State, Response<Body>) {
        let mut request = gotham::hyper::Request::get("/outbound")
            .body(Body::empty())
            .unwrap();
        if let Some(carrier) = Carrier::try_borrow_from(&state) {
            carrier.attach(&mut request);
        }
        let status = match apply(&mut request) {
            Ok(()) => StatusCode::OK,
            Err(e) if e.is_missing_carrier() => StatusCode::PRECONDITION_FAILED,
            Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let res = create_empty_response(&state, status);
        (state, res)
    }

    fn pipeline_router(rules: Vec<Rule>) -> Router {
        let (chain, pipelines) =
            single_pipeline(new_pipeline().add(TrackingMiddleware::new(rules)).build());

        build_router(chain, pipelines, |route| {
            route.get("/test").to(outbound);
            route.get("/twice").to(outbound_twice);
            route.get("/direct").to(direct_apply);
        })
    }

    fn plain_router() -> Router {
        build_simple_router(|route| {
            route.get("/test").to(outbound);
            route.get("/direct").to(direct_apply);
        })
    }

    #[test]
    fn header_round_trip() {
        let rules = vec![Rule::new(
            Location::Header,
            "x-tracking-id",
            Location::Header,
            "x-tracking-id",
        )];
        let test_server = TestServer::new(pipeline_router(rules)).unwrap();

        let res = test_server
            .client()
            .get("http://localhost/test")
            .with_header("x-tracking-id", HeaderValue::from_static("abc123"))
            .perform()
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["x-tracking-id"], "abc123");
    }

    #[test]
    fn every_location_round_trip() {
        let rules = vec![
            Rule::new(Location::Header, "x-header", Location::Header, "x-new-header"),
            Rule::new(
                Location::QueryParameter,
                "query",
                Location::QueryParameter,
                "new-query",
            ),
            Rule::new(Location::Cookie, "cookie", Location::Cookie, "new-cookie"),
        ];
        let test_server = TestServer::new(pipeline_router(rules)).unwrap();

        let res = test_server
            .client()
            .get("http://localhost/test?query=query-value")
            .with_header("x-header", HeaderValue::from_static("header-value"))
            .with_header(COOKIE, HeaderValue::from_static("cookie=cookie-value"))
            .perform()
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let headers = res.headers();
        assert_eq!(headers["x-new-header"], "header-value");
        assert_eq!(headers[COOKIE], "new-cookie=cookie-value");
        assert_eq!(headers["x-outbound-uri"], "/downstream?new-query=query-value");
        // inbound names are not reused on the outbound side
        assert!(headers.get("x-header").is_none());
    }

    #[test]
    fn cookie_maps_to_header() {
        let rules = vec![Rule::new(
            Location::Cookie,
            "session-id",
            Location::Header,
            "x-client-session-id",
        )];
        let test_server = TestServer::new(pipeline_router(rules)).unwrap();

        let res = test_server
            .client()
            .get("http://localhost/test")
            .with_header(COOKIE, HeaderValue::from_static("session-id=xyz"))
            .perform()
            .unwrap();

        assert_eq!(res.headers()["x-client-session-id"], "xyz");
        assert!(res.headers().get(COOKIE).is_none());
    }

    #[test]
    fn fallback_fills_missing_value() {
        let rules = vec![Rule::new(
            Location::Header,
            "x-tracking-id",
            Location::Header,
            "x-tracking-id",
        )
        .with_fallback(fallback::constant("blah"))];
        let test_server = TestServer::new(pipeline_router(rules)).unwrap();

        let res = test_server
            .client()
            .get("http://localhost/test")
            .perform()
            .unwrap();

        assert_eq!(res.headers()["x-tracking-id"], "blah");
    }

    #[test]
    fn missing_value_without_fallback_adds_nothing() {
        let rules = vec![Rule::new(
            Location::Header,
            "x-tracking-id",
            Location::Header,
            "x-tracking-id",
        )];
        let test_server = TestServer::new(pipeline_router(rules)).unwrap();

        let res = test_server
            .client()
            .get("http://localhost/test")
            .perform()
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().get("x-tracking-id").is_none());
    }

    #[test]
    fn fallback_runs_once_per_inbound_request() {
        let rules = vec![Rule::new(
            Location::Header,
            "x-tracking-id",
            Location::Header,
            "x-tracking-id",
        )
        .with_fallback(|name, inbound| {
            FALLBACK_CALLS.fetch_add(1, Ordering::SeqCst);
            fallback::generate_id(name, inbound)
        })];
        let test_server = TestServer::new(pipeline_router(rules)).unwrap();

        let res = test_server
            .client()
            .get("http://localhost/twice")
            .perform()
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(FALLBACK_CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_carrier_still_applies() {
        let rules = vec![Rule::new(Location::Header, "x-header", Location::Header, "x-header")];
        let test_server = TestServer::new(pipeline_router(rules)).unwrap();

        let res = test_server
            .client()
            .get("http://localhost/direct")
            .perform()
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
    }

    #[test]
    fn untracked_state_is_not_an_error() {
        let test_server = TestServer::new(plain_router()).unwrap();

        let res = test_server
            .client()
            .get("http://localhost/test")
            .with_header("x-tracking-id", HeaderValue::from_static("abc123"))
            .perform()
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().get("x-tracking-id").is_none());
        assert_eq!(res.headers()["x-outbound-uri"], "/downstream");

        let res = test_server
            .client()
            .get("http://localhost/direct")
            .perform()
            .unwrap();

        assert_eq!(res.status(), StatusCode::PRECONDITION_FAILED);
    }

    #[test]
    fn install_wraps_router() {
        let rules = vec![Rule::new(
            Location::QueryParameter,
            "track",
            Location::Header,
            "x-tracking-id",
        )];
        let test_server = TestServer::new(install(plain_router(), rules)).unwrap();

        let res = test_server
            .client()
            .get("http://localhost/test?track=from-query")
            .perform()
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["x-tracking-id"], "from-query");
    }

    #[test]
    fn request_id_fallback_uses_gotham_request_id() {
        let rules = vec![Rule::new(
            Location::Header,
            "x-tracking-id",
            Location::Header,
            "x-tracking-id",
        )
        .with_fallback(fallback::request_id)];
        let test_server = TestServer::new(install(plain_router(), rules)).unwrap();

        let res = test_server
            .client()
            .get("http://localhost/test")
            .with_header("x-request-id", HeaderValue::from_static("req-42"))
            .perform()
            .unwrap();

        assert_eq!(res.headers()["x-tracking-id"], "req-42");
    }
}

//! A gateway which forwards `/api` calls to a downstream service.
//!
//! Every call made downstream carries the caller's `x-tracking-id` header, generating one when
//! the caller did not send it, and its `session-id` cookie as the `x-client-session-id` header.
//!
//! By default the gateway is its own downstream service: `/whoami` reports the tracking values
//! it received. Set `DOWNSTREAM_URL` to forward somewhere else.

use gotham::handler::HandlerResult;
use gotham::helpers::http::response::create_response;
use gotham::hyper::{body, Body, HeaderMap, Response, StatusCode};
use gotham::middleware::state::StateMiddleware;
use gotham::pipeline::{new_pipeline, single_pipeline};
use gotham::router::builder::*;
use gotham::router::Router;
use gotham::state::{FromState, State, StateData};
use gotham_middleware_httptrack::{fallback, get, Location, Rule, TrackingMiddleware};

const ADDR: &str = "127.0.0.1:7878";

/// Base URL of the downstream service, shared with handlers through the request state.
#[derive(Clone)]
struct Downstream {
    base: String,
}

impl StateData for Downstream {}

fn rules() -> Vec<Rule> {
    vec![
        Rule::new(
            Location::Header,
            "x-tracking-id",
            Location::Header,
            "x-tracking-id",
        )
        .with_fallback(fallback::generate_id),
        Rule::new(
            Location::Cookie,
            "session-id",
            Location::Header,
            "x-client-session-id",
        ),
    ]
}

/// Calls the downstream `/whoami` and relays its answer.
async fn api(state: State) -> HandlerResult {
    let uri = format!("{}/whoami", Downstream::borrow_from(&state).base);
    let downstream = get(&state, uri.as_str());

    let res = match downstream.await {
        Ok(response) => {
            let status = response.status();
            match body::to_bytes(response.into_body()).await {
                Ok(bytes) => create_response(&state, status, mime::TEXT_PLAIN, bytes),
                Err(e) => bad_gateway(&state, e),
            }
        }
        Err(e) => bad_gateway(&state, e),
    };

    Ok((state, res))
}

fn bad_gateway<E: std::fmt::Display>(state: &State, e: E) -> Response<Body> {
    create_response(
        state,
        StatusCode::BAD_GATEWAY,
        mime::TEXT_PLAIN,
        format!("downstream call failed: {}\n", e),
    )
}

/// Reports the tracking values this request arrived with.
fn whoami(state: State) -> (State, String) {
    let message = {
        let headers = HeaderMap::borrow_from(&state);
        let value = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_owned()
        };
        format!(
            "x-tracking-id={} x-client-session-id={}\n",
            value("x-tracking-id"),
            value("x-client-session-id")
        )
    };

    (state, message)
}

fn router(downstream: Downstream) -> Router {
    let (chain, pipelines) = single_pipeline(
        new_pipeline()
            .add(TrackingMiddleware::new(rules()))
            .add(StateMiddleware::new(downstream))
            .build(),
    );

    build_router(chain, pipelines, |route| {
        route.get("/api").to_async(api);
        route.get("/whoami").to(whoami);
    })
}

/// Start a server and forward `/api` calls downstream.
pub fn main() -> anyhow::Result<()> {
    let downstream = Downstream {
        base: std::env::var("DOWNSTREAM_URL").unwrap_or_else(|_| format!("http://{}", ADDR)),
    };

    println!("Listening for requests at http://{}", ADDR);
    println!("Forwarding /api calls to {}", downstream.base);
    gotham::start(ADDR, router(downstream))?;
    Ok(())
}

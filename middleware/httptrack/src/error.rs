//! Errors raised while attaching tracked values to outbound requests.

use thiserror::Error;

/// An implementation of the single-parameter Result pattern over `httptrack::Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure modes of `apply` and the outbound request helpers.
#[derive(Debug, Error)]
pub enum Error {
    /// The outbound request carries no `Carrier`.
    ///
    /// This is expected whenever a request is built outside of a tracked inbound request, e.g.
    /// from a background job, or after the `State` was dropped along the way. The convenience
    /// constructors treat it as "nothing to propagate".
    #[error(
        "no tracking carrier found; the request was not built from a tracked State, \
         or the carrier was lost along the way"
    )]
    MissingCarrier,

    /// A tracked value cannot be written to the outbound request, e.g. a query parameter
    /// target on a request whose URI has no path, or a header name that is not valid HTTP.
    #[error("invalid outbound request: {0}")]
    InvalidRequest(String),

    /// The outbound request could not be built.
    #[error(transparent)]
    Http(#[from] hyper::http::Error),

    /// The HTTP client failed to issue the request.
    #[error(transparent)]
    Transport(#[from] hyper::Error),
}

impl Error {
    /// Returns `true` for the recoverable "no carrier" condition.
    pub fn is_missing_carrier(&self) -> bool {
        matches!(self, Error::MissingCarrier)
    }
}

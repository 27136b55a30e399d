//! Error types for the request pipeline.
//!
//! # Design
//! Every stage of the pipeline has its own variant so callers can tell a
//! configuration mistake from a codec failure, a network failure, an
//! exhausted rate gate or an unexpected status without matching on strings.
//! Transport and post-hook errors are boxed and surfaced transparently so they
//! can be downcast back to whatever the transport or hook produced.

use std::error::Error as StdError;
use std::fmt;

use http::HeaderMap;
use thiserror::Error;

use crate::codec::CodecError;

/// Error raised by a `Transport` implementation.
pub type TransportError = Box<dyn StdError + Send + Sync>;

/// Error returned by a post hook.
pub type HookError = Box<dyn StdError + Send + Sync>;

/// Errors returned by `HttpClient::request`.
#[derive(Debug, Error)]
pub enum Error {
    /// A structured request body was supplied with a missing or unknown encoding tag.
    #[error("invalid request encoding: {0}")]
    InvalidEncoding(String),

    /// A relative path was requested but the client has no base URL.
    #[error("no base url configured for relative request path")]
    MissingBaseUrl,

    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The request value could not be encoded. No request was sent.
    #[error(transparent)]
    Marshal(CodecError),

    /// The response body could not be read or decoded.
    #[error(transparent)]
    Unmarshal(CodecError),

    /// Connection, DNS, TLS or protocol failure reported by the transport.
    #[error(transparent)]
    Transport(TransportError),

    /// No rate gate token became available within the configured timeout.
    #[error("rate limit timeout")]
    RateLimitTimeout,

    #[error(transparent)]
    InvalidStatus(#[from] InvalidStatusError),

    /// Returned unchanged from a post hook.
    #[error(transparent)]
    Hook(HookError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn as_invalid_status(&self) -> Option<&InvalidStatusError> {
        match self {
            Error::InvalidStatus(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_rate_limit_timeout(&self) -> bool {
        matches!(self, Error::RateLimitTimeout)
    }
}

/// The response status was not one of the expected codes.
///
/// `content` holds at most the first 10 KiB of the response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidStatusError {
    pub expected: Vec<u16>,
    pub got: u16,
    pub headers: HeaderMap,
    pub content: String,
}

impl fmt::Display for InvalidStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid response status: got {}, expected {:?}; headers: {:?}, content: {}",
            self.got, self.expected, self.headers, self.content
        )
    }
}

impl StdError for InvalidStatusError {}

/// Find an `InvalidStatusError` behind a generic error, whether it is the
/// error itself or wrapped in `Error::InvalidStatus`.
pub fn invalid_status_error<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a InvalidStatusError> {
    if let Some(status) = err.downcast_ref::<InvalidStatusError>() {
        return Some(status);
    }
    err.downcast_ref::<Error>().and_then(Error::as_invalid_status)
}

/// True if `err` is an `InvalidStatusError` for exactly `code`.
pub fn is_invalid_status_code(err: &(dyn StdError + 'static), code: u16) -> bool {
    invalid_status_error(err).is_some_and(|status| status.got == code)
}

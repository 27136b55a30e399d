//! The I/O boundary of the pipeline.
//!
//! # Design
//! The pipeline never touches sockets itself. It builds an `HttpRequest` and
//! hands it to a `Transport`, which performs the exchange and returns an
//! `HttpResponse` with a live body stream. Timeouts, connection reuse and TLS
//! are the transport's business.
//!
//! `round_trip` is a single exchange. `execute` is a full execution that may
//! follow redirects; transports that cannot follow redirects inherit the
//! default, which is a plain `round_trip`.

use std::fmt;

use tracing::debug;
use ureq::tls::TlsConfig;
use ureq::{Agent, SendBody};

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse, ResponseBody};

/// Redirect hops followed by `UreqTransport::execute`.
pub const MAX_REDIRECTS: u32 = 10;

/// Performs HTTP exchanges for an `HttpClient`.
///
/// Implementations take the body out of the request when sending it.
pub trait Transport: Send + Sync {
    /// Perform exactly one request/response exchange. Redirect responses are
    /// returned as they are.
    fn round_trip(&self, request: &mut HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Perform the request, following redirects if the transport supports it.
    fn execute(&self, request: &mut HttpRequest) -> Result<HttpResponse, TransportError> {
        self.round_trip(request)
    }
}

impl<F> Transport for F
where
    F: Fn(&mut HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync,
{
    fn round_trip(&self, request: &mut HttpRequest) -> Result<HttpResponse, TransportError> {
        self(request)
    }
}

/// Blocking transport backed by `ureq`.
///
/// Holds one agent with redirects disabled for `round_trip` and one that
/// follows redirects for `execute`. Error statuses are returned as responses.
#[derive(Clone)]
pub struct UreqTransport {
    direct: Agent,
    following: Agent,
    insecure: bool,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::with_verification(true)
    }

    /// A transport that accepts any TLS certificate.
    pub fn insecure() -> Self {
        Self::with_verification(false)
    }

    pub fn is_insecure(&self) -> bool {
        self.insecure
    }

    fn with_verification(verify: bool) -> Self {
        let tls = TlsConfig::builder().disable_verification(!verify).build();

        let direct = Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(0)
            .max_redirects_will_error(false)
            .tls_config(tls.clone())
            .build()
            .new_agent();

        let following = Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(MAX_REDIRECTS)
            .tls_config(tls)
            .build()
            .new_agent();

        Self {
            direct,
            following,
            insecure: !verify,
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport")
            .field("insecure", &self.insecure)
            .finish()
    }
}

impl Transport for UreqTransport {
    fn round_trip(&self, request: &mut HttpRequest) -> Result<HttpResponse, TransportError> {
        send(&self.direct, request)
    }

    fn execute(&self, request: &mut HttpRequest) -> Result<HttpResponse, TransportError> {
        send(&self.following, request)
    }
}

fn send(agent: &Agent, request: &mut HttpRequest) -> Result<HttpResponse, TransportError> {
    let mut builder = http::Request::builder()
        .method(request.method.clone())
        .uri(request.url.as_str());
    if let Some(headers) = builder.headers_mut() {
        headers.extend(request.headers.clone());
    }

    let response = match request.body.take() {
        Some(reader) => agent.run(builder.body(SendBody::from_owned_reader(reader))?)?,
        None => agent.run(builder.body(())?)?,
    };

    let (parts, body) = response.into_parts();
    debug!(status = parts.status.as_u16(), "ureq exchange complete");
    Ok(HttpResponse::new(
        parts.status.as_u16(),
        parts.headers,
        ResponseBody::new(body.into_reader()),
    ))
}

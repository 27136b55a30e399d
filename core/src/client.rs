//! The request pipeline.
//!
//! # Design
//! `HttpClient` is configured once through `HttpClientBuilder` and is frozen
//! afterwards: default headers, post hooks and the rate gate live behind an
//! `Arc` and are only read while requests run, so a client can be cloned and
//! shared across threads freely.
//!
//! A call to `request` runs these stages in order and stops at the first
//! failure:
//! 1. encode the request value (no I/O on failure)
//! 2. build the URL and the `HttpRequest`
//! 3. merge headers
//! 4. take a rate gate slot, if a gate is configured
//! 5. send through the transport (`round_trip` when redirects are ignored,
//!    `execute` otherwise), then give the slot back
//! 6. run the post hook registered for the response status
//! 7. check the status against the expected codes
//! 8. decode, capture or drain the body as the request asked
//!
//! Stages 1 to 3 are exposed as `build_request` so they can be checked
//! without a network.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Cursor, Read};
use std::sync::Arc;
use std::time::Duration;

use http::header::{IntoHeaderName, ACCEPT, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue};
use tracing::{debug, instrument, trace};
use url::{form_urlencoded, Position, Url};

use crate::codec::{self, CodecError, Encoding, Unmarshal};
use crate::error::{Error, HookError, InvalidStatusError};
use crate::escape::escape_path;
use crate::http::{HttpRequest, HttpResponse, RequestBody, ResponseBody};
use crate::rate_gate::RateGate;
use crate::request::{RequestData, ResponseTarget};
use crate::transport::{Transport, UreqTransport};

/// Bytes of an unexpected-status body kept for diagnostics.
pub const MAX_ERROR_CONTENT: u64 = 10 * 1024;

/// Callback run for responses with a given status, before status checks and
/// body handling. An error aborts the request and is returned as-is.
pub type PostHook = Arc<dyn Fn(&HttpRequest, &mut HttpResponse) -> Result<(), HookError> + Send + Sync>;

/// Configures and creates an `HttpClient`.
pub struct HttpClientBuilder {
    base_url: Option<String>,
    headers: HeaderMap,
    transport: Option<Arc<dyn Transport>>,
    insecure: bool,
    post_hooks: HashMap<u16, PostHook>,
    rate_limit: Option<(usize, Duration)>,
}

impl HttpClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            headers: HeaderMap::new(),
            transport: None,
            insecure: false,
            post_hooks: HashMap::new(),
            rate_limit: None,
        }
    }

    /// Scheme, host and path prefix for requests that only give a path.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Add a default header sent with every request. Repeated calls for the
    /// same name add values.
    pub fn header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Use a custom transport. Overrides `insecure`.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Skip TLS certificate verification on the default transport.
    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Register the hook for `status`, replacing any earlier one.
    pub fn post_hook<F>(mut self, status: u16, hook: F) -> Self
    where
        F: Fn(&HttpRequest, &mut HttpResponse) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.post_hooks.insert(status, Arc::new(hook));
        self
    }

    /// Allow at most `limit` requests in flight. A zero `timeout` waits for
    /// a slot indefinitely.
    pub fn rate_limit(mut self, limit: usize, timeout: Duration) -> Self {
        self.rate_limit = Some((limit, timeout));
        self
    }

    pub fn build(self) -> Result<HttpClient, Error> {
        let base_url = self.base_url.as_deref().map(Url::parse).transpose()?;
        let rate_gate = self
            .rate_limit
            .map(|(limit, timeout)| RateGate::new(limit, timeout))
            .transpose()?;
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None if self.insecure => Arc::new(UreqTransport::insecure()),
            None => Arc::new(UreqTransport::new()),
        };

        Ok(HttpClient {
            inner: Arc::new(Inner {
                base_url,
                headers: self.headers,
                transport,
                post_hooks: self.post_hooks,
                rate_gate,
            }),
        })
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct Inner {
    base_url: Option<Url>,
    headers: HeaderMap,
    transport: Arc<dyn Transport>,
    post_hooks: HashMap<u16, PostHook>,
    rate_gate: Option<RateGate>,
}

/// Shared, immutable HTTP client running the request pipeline.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<Inner>,
}

impl HttpClient {
    /// Client with the default transport and no base URL.
    pub fn new() -> Self {
        Self::with_transport(UreqTransport::new())
    }

    /// Client whose default transport skips TLS certificate verification.
    pub fn insecure() -> Self {
        Self::with_transport(UreqTransport::insecure())
    }

    fn with_transport(transport: UreqTransport) -> Self {
        Self {
            inner: Arc::new(Inner {
                base_url: None,
                headers: HeaderMap::new(),
                transport: Arc::new(transport),
                post_hooks: HashMap::new(),
                rate_gate: None,
            }),
        }
    }

    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.inner.base_url.as_ref()
    }

    pub fn default_headers(&self) -> &HeaderMap {
        &self.inner.headers
    }

    pub fn rate_gate(&self) -> Option<&RateGate> {
        self.inner.rate_gate.as_ref()
    }

    pub fn has_post_hook(&self, status: u16) -> bool {
        self.inner.post_hooks.contains_key(&status)
    }

    /// Run the full pipeline for `req`.
    ///
    /// On success the response is returned with its body in whatever state
    /// `req.response` asked for; decoded values are written to the target.
    #[instrument(name = "http_request", skip_all, fields(method = %req.method))]
    pub fn request(&self, mut req: RequestData<'_>) -> Result<HttpResponse, Error> {
        let mut request = self.build_request(&mut req)?;
        let mut response = self.issue(&mut request, req.ignore_redirects)?;
        debug!(status = response.status, "response received");

        self.run_post_hook(&request, &mut response)?;
        check_status(&req.expected_status, &mut response)?;
        read_response(&mut req.response, &mut response.body)?;
        Ok(response)
    }

    /// Encode the body, resolve the URL and merge headers.
    ///
    /// Takes the body reader out of `req`.
    pub fn build_request(&self, req: &mut RequestData<'_>) -> Result<HttpRequest, Error> {
        let (body, content_type) = match marshal_request(req)? {
            Some((body, content_type)) => (Some(body), content_type),
            None => (None, None),
        };

        let url = if req.full_url.is_empty() {
            self.build_url(req)?
        } else {
            Url::parse(&req.full_url)?;
            req.full_url.clone()
        };

        let headers = self.merge_headers(req, content_type);
        Ok(HttpRequest {
            method: req.method.clone(),
            url,
            headers,
            body,
        })
    }

    /// URL for a request without a `full_url`: base URL path concatenated
    /// with the request path, escaped, followed by the sorted query string.
    /// A base URL without a path contributes nothing to the path.
    pub fn build_url(&self, req: &RequestData<'_>) -> Result<String, Error> {
        let base = self.inner.base_url.as_ref().ok_or(Error::MissingBaseUrl)?;

        let base_path = match base.path() {
            "/" => "",
            path => path,
        };
        let joined = format!("{base_path}{}", req.path);
        let path = if joined.is_empty() { "/".to_string() } else { escape_path(&joined) };

        let mut url = format!("{}{}", &base[..Position::BeforePath], path);
        if !req.params.is_empty() {
            let mut query = form_urlencoded::Serializer::new(String::new());
            for (key, values) in &req.params {
                for value in values {
                    query.append_pair(key, value);
                }
            }
            url.push('?');
            url.push_str(&query.finish());
        }
        Ok(url)
    }

    /// Layer headers so later layers replace earlier ones per name: `Accept`
    /// from the response encoding, `Content-Type` from the request encoding,
    /// client defaults, then request headers.
    fn merge_headers(&self, req: &RequestData<'_>, content_type: Option<&'static str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(encoding) = req.response.encoding() {
            headers.insert(ACCEPT, HeaderValue::from_static(encoding.media_type()));
        }
        if let Some(content_type) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        overlay(&mut headers, &self.inner.headers);
        overlay(&mut headers, &req.headers);
        headers
    }

    fn issue(&self, request: &mut HttpRequest, ignore_redirects: bool) -> Result<HttpResponse, Error> {
        let _permit = self.inner.rate_gate.as_ref().map(RateGate::acquire).transpose()?;

        debug!(method = %request.method, url = %request.url, ignore_redirects, "sending request");
        let transport = &self.inner.transport;
        let result = if ignore_redirects {
            transport.round_trip(request)
        } else {
            transport.execute(request)
        };
        result.map_err(Error::Transport)
    }

    fn run_post_hook(&self, request: &HttpRequest, response: &mut HttpResponse) -> Result<(), Error> {
        match self.inner.post_hooks.get(&response.status) {
            Some(hook) => {
                trace!(status = response.status, "running post hook");
                hook(request, response).map_err(Error::Hook)
            }
            None => Ok(()),
        }
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut hooks: Vec<_> = self.inner.post_hooks.keys().collect();
        hooks.sort();
        f.debug_struct("HttpClient")
            .field("base_url", &self.inner.base_url.as_ref().map(Url::as_str))
            .field("headers", &self.inner.headers)
            .field("post_hooks", &hooks)
            .field("rate_gate", &self.inner.rate_gate)
            .finish()
    }
}

/// Replace every header named in `layer`, keeping all of the layer's values.
fn overlay(target: &mut HeaderMap, layer: &HeaderMap) {
    for name in layer.keys() {
        target.remove(name);
        for value in layer.get_all(name) {
            target.append(name.clone(), value.clone());
        }
    }
}

/// Turn the request value into a body. `None` when there is nothing to send.
fn marshal_request(req: &mut RequestData<'_>) -> Result<Option<(RequestBody, Option<&'static str>)>, Error> {
    if let Some(reader) = req.req_reader.take() {
        return Ok(Some((reader, None)));
    }
    let Some(value) = req.req_value else {
        return Ok(None);
    };
    let encoding = req.req_encoding.ok_or_else(|| Error::InvalidEncoding(String::new()))?;
    let bytes = codec::marshal(encoding, value).map_err(Error::Marshal)?;
    let body: RequestBody = Box::new(Cursor::new(bytes));
    Ok(Some((body, Some(encoding.media_type()))))
}

fn check_status(expected: &[u16], response: &mut HttpResponse) -> Result<(), Error> {
    if expected.is_empty() || expected.contains(&response.status) {
        return Ok(());
    }

    let mut sample = Vec::new();
    let content = match response.body.by_ref().take(MAX_ERROR_CONTENT).read_to_end(&mut sample) {
        Ok(_) => String::from_utf8_lossy(&sample).into_owned(),
        Err(_) => String::new(),
    };
    response.body.close();

    Err(InvalidStatusError {
        expected: expected.to_vec(),
        got: response.status,
        headers: response.headers.clone(),
        content,
    }
    .into())
}

fn read_response(target: &mut ResponseTarget<'_>, body: &mut ResponseBody) -> Result<(), Error> {
    match target {
        ResponseTarget::Json(value) => decode(Encoding::Json, &mut **value, body),
        ResponseTarget::Xml(value) => decode(Encoding::Xml, &mut **value, body),
        ResponseTarget::Bytes(buf) => {
            **buf = read_and_close(body)?;
            Ok(())
        }
        ResponseTarget::Consume => {
            let drained = io::copy(body, &mut io::sink());
            body.close();
            drained.map(|_| ()).map_err(|err| Error::Unmarshal(CodecError::Io(err)))
        }
        ResponseTarget::Unhandled => Ok(()),
    }
}

fn decode(encoding: Encoding, target: &mut dyn Unmarshal, body: &mut ResponseBody) -> Result<(), Error> {
    let data = read_and_close(body)?;
    codec::unmarshal(encoding, &data, target).map_err(Error::Unmarshal)
}

fn read_and_close(body: &mut ResponseBody) -> Result<Vec<u8>, Error> {
    let data = body.read_all();
    body.close();
    data.map_err(|err| Error::Unmarshal(CodecError::Io(err)))
}

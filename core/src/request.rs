//! Per-call request description.
//!
//! # Design
//! `RequestData` says what one call should do: where to go, what to send,
//! which statuses are acceptable and what to do with the response body. It
//! borrows the request value and the response target from the caller, so a
//! decoded body lands directly in caller-owned storage.
//!
//! Fields are public and `Default` is implemented, so both struct-update
//! syntax and the chained setters below work.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;

use http::header::IntoHeaderName;
use http::{HeaderMap, HeaderValue, Method};

use crate::codec::{Encoding, Marshal, Unmarshal};
use crate::http::RequestBody;

/// What the pipeline does with the response body.
#[derive(Default)]
pub enum ResponseTarget<'a> {
    /// Decode the full body as JSON into the target.
    Json(&'a mut dyn Unmarshal),
    /// Decode the full body as XML into the target.
    Xml(&'a mut dyn Unmarshal),
    /// Copy the full body into the buffer.
    Bytes(&'a mut Vec<u8>),
    /// Read and discard the body, then close it.
    Consume,
    /// Leave the body open for the caller.
    #[default]
    Unhandled,
}

impl ResponseTarget<'_> {
    pub fn encoding(&self) -> Option<Encoding> {
        match self {
            ResponseTarget::Json(_) => Some(Encoding::Json),
            ResponseTarget::Xml(_) => Some(Encoding::Xml),
            _ => None,
        }
    }
}

impl fmt::Debug for ResponseTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResponseTarget::Json(_) => "Json",
            ResponseTarget::Xml(_) => "Xml",
            ResponseTarget::Bytes(_) => "Bytes",
            ResponseTarget::Consume => "Consume",
            ResponseTarget::Unhandled => "Unhandled",
        };
        f.write_str(name)
    }
}

/// Description of a single request.
///
/// A non-empty `full_url` is used verbatim; otherwise the URL is the client's
/// base URL joined with `path` and `params`. `req_reader` takes precedence
/// over `req_value` as the body source.
#[derive(Default)]
pub struct RequestData<'a> {
    pub method: Method,
    pub path: String,
    pub full_url: String,
    pub params: BTreeMap<String, Vec<String>>,
    pub headers: HeaderMap,
    pub req_reader: Option<RequestBody>,
    pub req_encoding: Option<Encoding>,
    pub req_value: Option<&'a dyn Marshal>,
    /// Acceptable status codes. Empty accepts anything.
    pub expected_status: Vec<u16>,
    pub ignore_redirects: bool,
    pub response: ResponseTarget<'a>,
}

impl<'a> RequestData<'a> {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET).path(path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST).path(path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT).path(path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE).path(path)
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn full_url(mut self, url: impl Into<String>) -> Self {
        self.full_url = url.into();
        self
    }

    /// Append a query value. Repeated keys keep their values in call order.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.entry(key.into()).or_default().push(value.into());
        self
    }

    /// Set a header, replacing earlier values for the same name.
    pub fn header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body_reader(mut self, reader: impl Read + Send + 'static) -> Self {
        self.req_reader = Some(Box::new(reader));
        self
    }

    pub fn body_value(mut self, encoding: Encoding, value: &'a dyn Marshal) -> Self {
        self.req_encoding = Some(encoding);
        self.req_value = Some(value);
        self
    }

    pub fn json(self, value: &'a dyn Marshal) -> Self {
        self.body_value(Encoding::Json, value)
    }

    pub fn xml(self, value: &'a dyn Marshal) -> Self {
        self.body_value(Encoding::Xml, value)
    }

    pub fn expect_status(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.expected_status = codes.into_iter().collect();
        self
    }

    pub fn ignore_redirects(mut self) -> Self {
        self.ignore_redirects = true;
        self
    }

    pub fn json_response(mut self, target: &'a mut dyn Unmarshal) -> Self {
        self.response = ResponseTarget::Json(target);
        self
    }

    pub fn xml_response(mut self, target: &'a mut dyn Unmarshal) -> Self {
        self.response = ResponseTarget::Xml(target);
        self
    }

    pub fn bytes_response(mut self, buf: &'a mut Vec<u8>) -> Self {
        self.response = ResponseTarget::Bytes(buf);
        self
    }

    pub fn consume_response(mut self) -> Self {
        self.response = ResponseTarget::Consume;
        self
    }
}

impl fmt::Debug for RequestData<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestData")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("full_url", &self.full_url)
            .field("params", &self.params)
            .field("headers", &self.headers)
            .field("has_reader", &self.req_reader.is_some())
            .field("req_encoding", &self.req_encoding)
            .field("has_value", &self.req_value.is_some())
            .field("expected_status", &self.expected_status)
            .field("ignore_redirects", &self.ignore_redirects)
            .field("response", &self.response)
            .finish()
    }
}

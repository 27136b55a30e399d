//! HTTP exchange types passed between the pipeline and its transport.
//!
//! # Design
//! Requests and responses are plain data with owned fields. The pipeline
//! builds an `HttpRequest`, hands it to a `Transport` for the actual I/O, and
//! gets back an `HttpResponse` whose body is still a live stream. Method and
//! header types come from the `http` crate so header names stay
//! case-insensitive and multi-valued headers are representable.

use std::fmt;
use std::io::{self, Read};

pub use http::{HeaderMap, HeaderName, HeaderValue, Method};

/// Streaming request body. Transports take it out of the request when they
/// send it, so a request can only be sent once.
pub type RequestBody = Box<dyn Read + Send>;

/// An outgoing HTTP request.
///
/// Produced by `HttpClient::build_request`. After a round trip `body` is
/// `None`; post hooks observe the request in that state.
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// An HTTP response as delivered by the transport.
///
/// The body is left open unless the request asked the pipeline to decode,
/// capture or consume it.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl HttpResponse {
    pub fn new(status: u16, headers: HeaderMap, body: ResponseBody) -> Self {
        Self { status, headers, body }
    }
}

/// Readable response body that can be closed.
///
/// Once closed, every read fails with "read on closed response body".
pub struct ResponseBody {
    reader: Option<Box<dyn Read + Send>>,
}

impl ResponseBody {
    pub fn new(reader: impl Read + Send + 'static) -> Self {
        Self {
            reader: Some(Box::new(reader)),
        }
    }

    pub fn empty() -> Self {
        Self::new(io::empty())
    }

    /// Release the underlying stream. Closing twice is a no-op.
    pub fn close(&mut self) {
        self.reader.take();
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }

    /// Read the remaining body into memory.
    pub fn read_all(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl From<Vec<u8>> for ResponseBody {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(io::Cursor::new(bytes))
    }
}

impl From<&'static str> for ResponseBody {
    fn from(text: &'static str) -> Self {
        Self::new(text.as_bytes())
    }
}

impl Read for ResponseBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.reader.as_mut() {
            Some(reader) => reader.read(buf),
            None => Err(io::Error::other("read on closed response body")),
        }
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBody")
            .field("closed", &self.is_closed())
            .finish()
    }
}

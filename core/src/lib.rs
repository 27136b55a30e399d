//! Configurable HTTP request/response pipeline.
//!
//! # Overview
//! A caller describes a request declaratively with `RequestData` (method,
//! path or full URL, query params, headers, body, expected statuses, what to
//! do with the response body) and `HttpClient::request` runs it end to end:
//! encode the body, build the URL, merge headers, wait for a rate gate slot,
//! send through the transport, run the post hook for the status, validate
//! the status and decode the body into the caller's target.
//!
//! # Design
//! - `HttpClient` is built once and frozen; clones share state and can be
//!   used from many threads at once.
//! - All network I/O goes through the `Transport` trait. `UreqTransport` is
//!   the default; tests and callers can plug in their own.
//! - Codecs are selected by `Encoding` tag and write straight into
//!   caller-owned values through the `Marshal` / `Unmarshal` traits.
//! - Every failure is returned to the caller as an `Error`; nothing is
//!   retried.

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod escape;
pub mod http;
pub mod rate_gate;
pub mod request;
pub mod transport;
pub mod upload;

pub use client::{HttpClient, HttpClientBuilder, PostHook, MAX_ERROR_CONTENT};
pub use codec::{CodecError, Encoding, Marshal, Unmarshal, XML_HEADER};
pub use config::{ClientConfig, RateLimitConfig};
pub use error::{invalid_status_error, is_invalid_status_code, Error, HookError, InvalidStatusError, TransportError};
pub use escape::escape_path;
pub use crate::http::{HeaderMap, HeaderName, HeaderValue, HttpRequest, HttpResponse, Method, RequestBody, ResponseBody};
pub use rate_gate::{RateGate, RatePermit};
pub use request::{RequestData, ResponseTarget};
pub use transport::{Transport, UreqTransport};

//! Serializable client configuration.
//!
//! # Design
//! `ClientConfig` is plain data that can live in a JSON file. It only feeds
//! `HttpClientBuilder`; hooks and custom transports are code and are added
//! on the builder afterwards.

use std::collections::BTreeMap;
use std::time::Duration;

use http::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::client::HttpClientBuilder;
use crate::error::Error;

/// Settings for an `HttpClient`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL for requests that only give a path.
    pub base_url: Option<String>,
    /// Headers sent with every request.
    pub headers: BTreeMap<String, Vec<String>>,
    /// Skip TLS certificate verification.
    pub insecure: bool,
    pub rate_limit: Option<RateLimitConfig>,
}

/// Concurrency cap on in-flight requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub limit: usize,
    /// Maximum wait for a slot in milliseconds. 0 waits forever.
    #[serde(default)]
    pub timeout_ms: u64,
}

impl ClientConfig {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    fn header_map(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        for (name, values) in &self.headers {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| Error::Config(format!("header name {name:?}: {e}")))?;
            for value in values {
                let value = HeaderValue::try_from(value.as_str())
                    .map_err(|e| Error::Config(format!("header {name}: {e}")))?;
                headers.append(name.clone(), value);
            }
        }
        Ok(headers)
    }
}

impl HttpClientBuilder {
    /// Start a builder from `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self, Error> {
        let mut builder = HttpClientBuilder::new()
            .headers(config.header_map()?)
            .insecure(config.insecure);
        if let Some(base_url) = &config.base_url {
            builder = builder.base_url(base_url.clone());
        }
        if let Some(rate_limit) = config.rate_limit {
            builder = builder.rate_limit(rate_limit.limit, Duration::from_millis(rate_limit.timeout_ms));
        }
        Ok(builder)
    }
}

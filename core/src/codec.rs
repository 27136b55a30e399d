//! Body encodings and the codecs behind them.
//!
//! # Design
//! Request values and response targets are type-erased through two small
//! object-safe traits, `Marshal` and `Unmarshal`, blanket-implemented for
//! every serde type. A `RequestData` can then hold `&dyn Marshal` /
//! `&mut dyn Unmarshal` without becoming generic, and the codec is chosen at
//! runtime from the `Encoding` tag.

use std::fmt;
use std::io;
use std::str::FromStr;

use quick_xml::errors::serialize::{DeError, SeError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::error::Error;

/// Declaration prepended to every XML request body.
pub const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// Wire encoding of a structured body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Json,
    Xml,
}

impl Encoding {
    /// Media type used for both `Content-Type` and `Accept`.
    pub fn media_type(self) -> &'static str {
        match self {
            Encoding::Json => "application/json",
            Encoding::Xml => "application/xml",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::Json => "JSON",
            Encoding::Xml => "XML",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        if tag.eq_ignore_ascii_case("json") {
            Ok(Encoding::Json)
        } else if tag.eq_ignore_ascii_case("xml") {
            Ok(Encoding::Xml)
        } else {
            Err(Error::InvalidEncoding(tag.to_string()))
        }
    }
}

/// Failure inside a codec. The display is the underlying error's message.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    XmlSerialize(#[from] SeError),

    #[error(transparent)]
    XmlDeserialize(#[from] DeError),

    /// Reading the body failed before decoding could start.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A value that can be written as a request body.
pub trait Marshal {
    fn marshal_json(&self) -> Result<Vec<u8>, CodecError>;
    fn marshal_xml(&self) -> Result<Vec<u8>, CodecError>;
}

impl<T: Serialize + ?Sized> Marshal for T {
    fn marshal_json(&self) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(self)?)
    }

    fn marshal_xml(&self) -> Result<Vec<u8>, CodecError> {
        let body = quick_xml::se::to_string(self)?;
        let mut buf = Vec::with_capacity(XML_HEADER.len() + body.len());
        buf.extend_from_slice(XML_HEADER.as_bytes());
        buf.extend_from_slice(body.as_bytes());
        Ok(buf)
    }
}

/// A caller-owned target a response body is decoded into.
pub trait Unmarshal {
    fn unmarshal_json(&mut self, data: &[u8]) -> Result<(), CodecError>;
    fn unmarshal_xml(&mut self, data: &[u8]) -> Result<(), CodecError>;
}

impl<T: DeserializeOwned> Unmarshal for T {
    fn unmarshal_json(&mut self, data: &[u8]) -> Result<(), CodecError> {
        *self = serde_json::from_slice(data)?;
        Ok(())
    }

    fn unmarshal_xml(&mut self, data: &[u8]) -> Result<(), CodecError> {
        *self = quick_xml::de::from_reader(data)?;
        Ok(())
    }
}

pub fn marshal(encoding: Encoding, value: &dyn Marshal) -> Result<Vec<u8>, CodecError> {
    match encoding {
        Encoding::Json => value.marshal_json(),
        Encoding::Xml => value.marshal_xml(),
    }
}

pub fn unmarshal(encoding: Encoding, data: &[u8], target: &mut dyn Unmarshal) -> Result<(), CodecError> {
    match encoding {
        Encoding::Json => target.unmarshal_json(data),
        Encoding::Xml => target.unmarshal_xml(data),
    }
}

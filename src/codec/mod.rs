//! The `codec` module turns protocol messages into frame bodies and back.
//!
//! Three formats are supported and chosen per connection during the handshake:
//! - `JSON`: an object with `method`, optional `topic` and `value` fields
//! - `XML`: a `<data>` tree with `method`, `topic` and `value` elements; values
//!   are rendered as text
//! - `BINARY`: a `bincode` image of the message, carrying any `Value` verbatim
//!
//! Encoding and decoding are pure transformations. A body that does not parse
//! under the declared format is a `MalformedMessage`.

mod binary;
mod json;
mod xml;

use std::fmt;
use std::str::FromStr;

use crate::broker::message::{Envelope, Method, Value};
use crate::utils::{BrokerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    #[default]
    Json,
    Xml,
    Binary,
}

impl Format {
    pub fn name(&self) -> &'static str {
        match self {
            Format::Json => "JSON",
            Format::Xml => "XML",
            Format::Binary => "BINARY",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "JSON" => Ok(Format::Json),
            "XML" => Ok(Format::Xml),
            "BINARY" => Ok(Format::Binary),
            _ => Err(BrokerError::UnknownFormat(s.to_string())),
        }
    }
}

/// Encode one message body in `format`.
pub fn encode(method: Method, topic: Option<&str>, value: &Value, format: Format) -> Result<Vec<u8>> {
    match format {
        Format::Json => json::encode(method.as_str(), topic, value),
        Format::Xml => xml::encode(method.as_str(), topic, value),
        Format::Binary => binary::encode(method.as_str(), topic, value),
    }
}

/// Decode one frame body declared to be in `format`.
pub fn decode(bytes: &[u8], format: Format) -> Result<Envelope> {
    match format {
        Format::Json => json::decode(bytes),
        Format::Xml => xml::decode(bytes),
        Format::Binary => binary::decode(bytes),
    }
}

fn malformed(err: impl fmt::Display) -> BrokerError {
    BrokerError::MalformedMessage(err.to_string())
}

#[cfg(test)]
mod tests;

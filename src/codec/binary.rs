use bincode::Options;
use serde::Serialize;

use super::malformed;
use crate::broker::message::{Envelope, Value};
use crate::utils::{BrokerError, Result};

/// Borrowed twin of `Envelope`; serializes to the same bytes.
#[derive(Serialize)]
struct EnvelopeRef<'a> {
    method: &'a str,
    topic: Option<&'a str>,
    value: Option<&'a Value>,
}

/// Fixed-width integers, little endian, and a body must be exactly one envelope.
fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

pub(super) fn encode(method: &str, topic: Option<&str>, value: &Value) -> Result<Vec<u8>> {
    let envelope = EnvelopeRef {
        method,
        topic,
        value: Some(value),
    };
    options()
        .serialize(&envelope)
        .map_err(|_| BrokerError::Unrepresentable("BINARY"))
}

pub(super) fn decode(bytes: &[u8]) -> Result<Envelope> {
    options().deserialize(bytes).map_err(malformed)
}

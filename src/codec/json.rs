use serde_json::{Map, Value as JsonValue};

use super::malformed;
use crate::broker::message::{Envelope, Value};
use crate::utils::{BrokerError, Result};

pub(super) fn encode(method: &str, topic: Option<&str>, value: &Value) -> Result<Vec<u8>> {
    let mut object = Map::new();
    object.insert("method".to_string(), JsonValue::from(method));
    if let Some(topic) = topic {
        object.insert("topic".to_string(), JsonValue::from(topic));
    }
    object.insert("value".to_string(), JsonValue::from(value));

    serde_json::to_vec(&JsonValue::Object(object)).map_err(|_| BrokerError::Unrepresentable("JSON"))
}

pub(super) fn decode(bytes: &[u8]) -> Result<Envelope> {
    let parsed: JsonValue = serde_json::from_slice(bytes).map_err(malformed)?;
    let JsonValue::Object(mut object) = parsed else {
        return Err(malformed("expected a JSON object"));
    };

    let method = match object.remove("method") {
        Some(JsonValue::String(method)) => method,
        Some(_) => return Err(malformed("`method` must be a string")),
        None => return Err(malformed("missing `method`")),
    };
    let topic = match object.remove("topic") {
        Some(JsonValue::String(topic)) => Some(topic),
        Some(JsonValue::Null) | None => None,
        Some(_) => return Err(malformed("`topic` must be a string")),
    };
    let value = object.remove("value").map(Value::from);

    Ok(Envelope {
        method,
        topic,
        value,
    })
}

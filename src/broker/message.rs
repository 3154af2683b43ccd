//! Message definitions for the broker
//!
//! `Message` is the typed form of one decoded frame. Decoding first produces an
//! `Envelope` whose method is still raw text, because the handshake frame on a
//! new connection carries a method the broker never interprets.
//!
//! Notes on fields:
//! - `method`: what the frame asks for (or answers)
//! - `topic`: topic name or subscription pattern; absent for `LIST_TOPICS`
//! - `value`: payload; for the handshake it names the serialization format

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::de::{self, DeserializeSeed, EnumAccess, MapAccess, SeqAccess, VariantAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::utils::{BrokerError, Result};

/// A payload carried by a message.
///
/// The variant set is the common ground of the supported formats; the tree
/// format can only render the scalar variants and flat lists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Text rendering of a scalar value, `None` for lists and maps.
    pub fn as_scalar_text(&self) -> Option<String> {
        match self {
            Value::Null => Some(String::new()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::List(_) | Value::Map(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(fields) => Value::Map(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            // Non-finite floats have no JSON form and become null.
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            Value::Map(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Lists and maps may nest at most this deep when deserialized.
pub const MAX_VALUE_DEPTH: usize = 128;

const VARIANTS: &[&str] = &["Null", "Bool", "Int", "Float", "Text", "List", "Map"];

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        ValueSeed { depth: 0 }.deserialize(deserializer)
    }
}

/// Deserializes one `Value`, counting how many lists and maps enclose it.
#[derive(Clone, Copy)]
struct ValueSeed {
    depth: usize,
}

impl ValueSeed {
    fn nested<E: de::Error>(self) -> std::result::Result<Self, E> {
        if self.depth >= MAX_VALUE_DEPTH {
            return Err(E::custom(format_args!(
                "value nesting exceeds {MAX_VALUE_DEPTH} levels"
            )));
        }
        Ok(ValueSeed {
            depth: self.depth + 1,
        })
    }
}

impl<'de> DeserializeSeed<'de> for ValueSeed {
    type Value = Value;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Value, D::Error> {
        deserializer.deserialize_enum("Value", VARIANTS, self)
    }
}

impl<'de> Visitor<'de> for ValueSeed {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a Value variant")
    }

    fn visit_enum<A: EnumAccess<'de>>(self, data: A) -> std::result::Result<Value, A::Error> {
        let (tag, variant) = data.variant::<Tag>()?;
        match tag {
            Tag::Null => variant.unit_variant().map(|()| Value::Null),
            Tag::Bool => variant.newtype_variant().map(Value::Bool),
            Tag::Int => variant.newtype_variant().map(Value::Int),
            Tag::Float => variant.newtype_variant().map(Value::Float),
            Tag::Text => variant.newtype_variant().map(Value::Text),
            Tag::List => variant
                .newtype_variant_seed(ListSeed(self.nested()?))
                .map(Value::List),
            Tag::Map => variant
                .newtype_variant_seed(MapSeed(self.nested()?))
                .map(Value::Map),
        }
    }
}

enum Tag {
    Null,
    Bool,
    Int,
    Float,
    Text,
    List,
    Map,
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_identifier(TagVisitor)
    }
}

struct TagVisitor;

impl Visitor<'_> for TagVisitor {
    type Value = Tag;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a Value variant tag")
    }

    fn visit_u64<E: de::Error>(self, index: u64) -> std::result::Result<Tag, E> {
        match index {
            0 => Ok(Tag::Null),
            1 => Ok(Tag::Bool),
            2 => Ok(Tag::Int),
            3 => Ok(Tag::Float),
            4 => Ok(Tag::Text),
            5 => Ok(Tag::List),
            6 => Ok(Tag::Map),
            _ => Err(E::invalid_value(de::Unexpected::Unsigned(index), &self)),
        }
    }

    fn visit_str<E: de::Error>(self, name: &str) -> std::result::Result<Tag, E> {
        match name {
            "Null" => Ok(Tag::Null),
            "Bool" => Ok(Tag::Bool),
            "Int" => Ok(Tag::Int),
            "Float" => Ok(Tag::Float),
            "Text" => Ok(Tag::Text),
            "List" => Ok(Tag::List),
            "Map" => Ok(Tag::Map),
            _ => Err(E::unknown_variant(name, VARIANTS)),
        }
    }
}

struct ListSeed(ValueSeed);

impl<'de> DeserializeSeed<'de> for ListSeed {
    type Value = Vec<Value>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Vec<Value>, D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for ListSeed {
    type Value = Vec<Value>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a list of values")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Vec<Value>, A::Error> {
        // length prefixes come from the peer
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(1024));
        while let Some(item) = seq.next_element_seed(self.0)? {
            items.push(item);
        }
        Ok(items)
    }
}

struct MapSeed(ValueSeed);

impl<'de> DeserializeSeed<'de> for MapSeed {
    type Value = BTreeMap<String, Value>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<BTreeMap<String, Value>, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for MapSeed {
    type Value = BTreeMap<String, Value>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<BTreeMap<String, Value>, A::Error> {
        let mut fields = BTreeMap::new();
        while let Some((key, value)) = map.next_entry_seed(PhantomData::<String>, self.0)? {
            fields.insert(key, value);
        }
        Ok(fields)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Publish,
    PublishRep,
    Subscribe,
    SubscribeRep,
    Cancel,
    ListTopics,
    ListTopicsRep,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Publish => "PUBLISH",
            Method::PublishRep => "PUBLISH_REP",
            Method::Subscribe => "SUBSCRIBE",
            Method::SubscribeRep => "SUBSCRIBE_REP",
            Method::Cancel => "CANCEL",
            Method::ListTopics => "LIST_TOPICS",
            Method::ListTopicsRep => "LIST_TOPICS_REP",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PUBLISH" => Ok(Method::Publish),
            "PUBLISH_REP" => Ok(Method::PublishRep),
            "SUBSCRIBE" => Ok(Method::Subscribe),
            "SUBSCRIBE_REP" => Ok(Method::SubscribeRep),
            "CANCEL" => Ok(Method::Cancel),
            "LIST_TOPICS" => Ok(Method::ListTopics),
            "LIST_TOPICS_REP" => Ok(Method::ListTopicsRep),
            other => Err(BrokerError::UnknownMethod(other.to_string())),
        }
    }
}

/// A decoded frame whose method has not been interpreted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub method: String,
    pub topic: Option<String>,
    pub value: Option<Value>,
}

impl Envelope {
    pub fn into_message(self) -> Result<Message> {
        Ok(Message {
            method: self.method.parse()?,
            topic: self.topic,
            value: self.value,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub method: Method,
    pub topic: Option<String>,
    pub value: Option<Value>,
}

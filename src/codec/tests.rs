use std::collections::BTreeMap;

use super::{Format, decode, encode};
use crate::broker::message::{MAX_VALUE_DEPTH, Message, Method, Value};
use crate::utils::BrokerError;

fn roundtrip(method: Method, topic: Option<&str>, value: &Value, format: Format) -> Message {
    let bytes = encode(method, topic, value, format).unwrap();
    decode(&bytes, format).unwrap().into_message().unwrap()
}

#[test]
fn test_format_names_parse_case_insensitively() {
    assert_eq!("JSON".parse::<Format>().unwrap(), Format::Json);
    assert_eq!("xml".parse::<Format>().unwrap(), Format::Xml);
    assert_eq!(" Binary ".parse::<Format>().unwrap(), Format::Binary);
    assert!(matches!(
        "YAML".parse::<Format>(),
        Err(BrokerError::UnknownFormat(name)) if name == "YAML"
    ));
    assert_eq!(Format::default(), Format::Json);
}

#[test]
fn test_json_roundtrip_preserves_native_types() {
    let mut reading = BTreeMap::new();
    reading.insert("celsius".to_string(), Value::Float(21.5));
    reading.insert("ok".to_string(), Value::Bool(true));
    let value = Value::List(vec![Value::Int(3), Value::Map(reading), Value::Null]);

    let msg = roundtrip(Method::Publish, Some("temp"), &value, Format::Json);
    assert_eq!(msg.method, Method::Publish);
    assert_eq!(msg.topic.as_deref(), Some("temp"));
    assert_eq!(msg.value, Some(value));
}

#[test]
fn test_json_omits_absent_topic() {
    let bytes = encode(
        Method::ListTopicsRep,
        None,
        &Value::List(vec!["a".into()]),
        Format::Json,
    )
    .unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed["method"], "LIST_TOPICS_REP");
    assert!(parsed.get("topic").is_none());
    assert_eq!(parsed["value"], serde_json::json!(["a"]));
}

#[test]
fn test_json_decodes_client_frames() {
    let env = decode(br#"{"method":"SUBSCRIBE","topic":"temp"}"#, Format::Json).unwrap();
    assert_eq!(env.method, "SUBSCRIBE");
    assert_eq!(env.topic.as_deref(), Some("temp"));
    assert_eq!(env.value, None);

    let env = decode(br#"{"method":"PUBLISH","topic":"temp","value":21.5}"#, Format::Json).unwrap();
    assert_eq!(env.value, Some(Value::Float(21.5)));
}

#[test]
fn test_json_rejects_malformed_bodies() {
    for body in [
        &b"not json"[..],
        br#"[1, 2, 3]"#,
        br#"{"topic":"temp"}"#,
        br#"{"method":7}"#,
        br#"{"method":"PUBLISH","topic":5}"#,
        b"",
    ] {
        assert!(
            matches!(decode(body, Format::Json), Err(BrokerError::MalformedMessage(_))),
            "expected {:?} to be rejected",
            String::from_utf8_lossy(body)
        );
    }
}

#[test]
fn test_xml_renders_values_as_text() {
    let msg = roundtrip(Method::PublishRep, Some("temp"), &Value::Float(21.5), Format::Xml);
    assert_eq!(msg.method, Method::PublishRep);
    assert_eq!(msg.topic.as_deref(), Some("temp"));
    assert_eq!(msg.value, Some(Value::Text("21.5".to_string())));

    let msg = roundtrip(Method::Publish, Some("on"), &Value::Bool(true), Format::Xml);
    assert_eq!(msg.value, Some(Value::Text("true".to_string())));
}

#[test]
fn test_xml_layout() {
    let bytes = encode(Method::SubscribeRep, Some("a"), &"v".into(), Format::Xml).unwrap();
    assert_eq!(
        String::from_utf8(bytes).unwrap(),
        r#"<?xml version="1.0"?><data><method>SUBSCRIBE_REP</method><topic>a</topic><value>v</value></data>"#
    );
}

#[test]
fn test_xml_escapes_markup_in_text() {
    let value = Value::Text("<b>&\"fish\"</b>".to_string());
    let msg = roundtrip(Method::Publish, Some("a&b"), &value, Format::Xml);
    assert_eq!(msg.topic.as_deref(), Some("a&b"));
    assert_eq!(msg.value, Some(value));
}

#[test]
fn test_xml_lists_become_items() {
    let value = Value::List(vec!["a".into(), "b".into(), "a/c".into()]);
    let msg = roundtrip(Method::ListTopicsRep, None, &value, Format::Xml);
    assert_eq!(msg.topic, None);
    assert_eq!(msg.value, Some(value));

    let empty = roundtrip(Method::ListTopicsRep, None, &Value::List(Vec::new()), Format::Xml);
    // An empty list has no items, so it reads back as empty text.
    assert_eq!(empty.value, Some(Value::Text(String::new())));
}

#[test]
fn test_xml_cannot_render_maps() {
    let mut fields = BTreeMap::new();
    fields.insert("k".to_string(), Value::Int(1));
    assert!(matches!(
        encode(Method::Publish, Some("t"), &Value::Map(fields), Format::Xml),
        Err(BrokerError::Unrepresentable("XML"))
    ));

    let nested = Value::List(vec![Value::List(vec![])]);
    assert!(matches!(
        encode(Method::Publish, Some("t"), &nested, Format::Xml),
        Err(BrokerError::Unrepresentable("XML"))
    ));
}

#[test]
fn test_xml_accepts_attribute_form() {
    let body = br#"<?xml version="1.0"?><data method="PUBLISH" topic="temp"><value>21</value></data>"#;
    let env = decode(body, Format::Xml).unwrap();
    assert_eq!(env.method, "PUBLISH");
    assert_eq!(env.topic.as_deref(), Some("temp"));
    assert_eq!(env.value, Some(Value::Text("21".to_string())));
}

#[test]
fn test_xml_handshake_without_topic() {
    let env = decode(b"<data><method>HELLO</method><value>BINARY</value></data>", Format::Xml).unwrap();
    assert_eq!(env.method, "HELLO");
    assert_eq!(env.topic, None);
    assert_eq!(env.value.as_ref().and_then(Value::as_str), Some("BINARY"));
}

#[test]
fn test_xml_rejects_malformed_bodies() {
    for body in [
        &b"plain text"[..],
        b"<data><method>PUBLISH</method>",
        b"<data><value>1</value></data>",
        b"<data><method>PUBLISH</oops></data>",
        b"<a><method>X</method></a><b/>",
        b"\xff\xfe",
    ] {
        assert!(
            matches!(decode(body, Format::Xml), Err(BrokerError::MalformedMessage(_))),
            "expected {:?} to be rejected",
            String::from_utf8_lossy(body)
        );
    }
}

#[test]
fn test_binary_carries_any_value() {
    let mut fields = BTreeMap::new();
    fields.insert("nested".to_string(), Value::List(vec![Value::Int(-4), Value::Null]));
    let value = Value::Map(fields);

    let msg = roundtrip(Method::Publish, Some("deep"), &value, Format::Binary);
    assert_eq!(msg.topic.as_deref(), Some("deep"));
    assert_eq!(msg.value, Some(value));

    let msg = roundtrip(Method::ListTopics, None, &Value::Null, Format::Binary);
    assert_eq!(msg.method, Method::ListTopics);
    assert_eq!(msg.topic, None);
}

#[test]
fn test_binary_rejects_garbage() {
    assert!(matches!(
        decode(&[0xff; 3], Format::Binary),
        Err(BrokerError::MalformedMessage(_))
    ));
    assert!(matches!(
        decode(&[], Format::Binary),
        Err(BrokerError::MalformedMessage(_))
    ));
}

#[test]
fn test_decoding_in_the_wrong_format_fails() {
    let bytes = encode(Method::Publish, Some("t"), &Value::Int(1), Format::Binary).unwrap();
    assert!(decode(&bytes, Format::Json).is_err());
}

#[test]
fn test_unknown_method_surfaces_after_decode() {
    let env = decode(br#"{"method":"PING"}"#, Format::Json).unwrap();
    assert!(matches!(
        env.into_message(),
        Err(BrokerError::UnknownMethod(m)) if m == "PING"
    ));
}

/// A BINARY PUBLISH body whose value is `depth` lists wrapped around a null.
fn nested_binary_publish(depth: usize) -> Vec<u8> {
    fn put_str(body: &mut Vec<u8>, s: &str) {
        body.extend_from_slice(&(s.len() as u64).to_le_bytes());
        body.extend_from_slice(s.as_bytes());
    }

    let mut body = Vec::new();
    put_str(&mut body, "PUBLISH");
    body.push(1);
    put_str(&mut body, "t");
    body.push(1);
    for _ in 0..depth {
        body.extend_from_slice(&5u32.to_le_bytes());
        body.extend_from_slice(&1u64.to_le_bytes());
    }
    body.extend_from_slice(&0u32.to_le_bytes());
    body
}

#[test]
fn test_binary_rejects_deeply_nested_values() {
    let body = nested_binary_publish(5000);
    assert!(body.len() <= crate::transport::frame::MAX_BODY_LEN);
    assert!(matches!(
        decode(&body, Format::Binary),
        Err(BrokerError::MalformedMessage(msg)) if msg.contains("nesting")
    ));

    let env = decode(&nested_binary_publish(MAX_VALUE_DEPTH), Format::Binary).unwrap();
    let mut value = env.value.unwrap();
    let mut depth = 0;
    while let Value::List(mut items) = value {
        value = items.pop().unwrap();
        depth += 1;
    }
    assert_eq!(depth, MAX_VALUE_DEPTH);
    assert_eq!(value, Value::Null);

    assert!(decode(&nested_binary_publish(MAX_VALUE_DEPTH + 1), Format::Binary).is_err());
}

#[test]
fn test_binary_layout_matches_hand_built_body() {
    let bytes = encode(Method::Publish, Some("t"), &Value::Null, Format::Binary).unwrap();
    assert_eq!(bytes, nested_binary_publish(0));
}

#[test]
fn test_binary_rejects_trailing_bytes() {
    let mut bytes = encode(Method::Publish, Some("t"), &Value::Int(1), Format::Binary).unwrap();
    assert!(decode(&bytes, Format::Binary).is_ok());
    bytes.push(0);
    assert!(matches!(
        decode(&bytes, Format::Binary),
        Err(BrokerError::MalformedMessage(_))
    ));
}

#[test]
fn test_xml_reads_cdata_as_text() {
    let body = b"<data><method>PUBLISH</method><topic>t</topic><value><![CDATA[21.5]]></value></data>";
    let env = decode(body, Format::Xml).unwrap();
    assert_eq!(env.value, Some(Value::Text("21.5".to_string())));

    let body = b"<data><method>PUBLISH</method><topic>t</topic><value><![CDATA[<b>&amp;</b>]]></value></data>";
    let env = decode(body, Format::Xml).unwrap();
    assert_eq!(env.value, Some(Value::Text("<b>&amp;</b>".to_string())));
}

#[test]
fn test_xml_joins_text_split_by_comments() {
    let body = b"<data><method>PUB<!--x-->LISH</method><topic>a<!--c-->b</topic>\
        <value><item>x<![CDATA[y]]></item><item>z</item></value></data>";
    let env = decode(body, Format::Xml).unwrap();
    assert_eq!(env.method, "PUBLISH");
    assert_eq!(env.topic.as_deref(), Some("ab"));
    assert_eq!(
        env.value,
        Some(Value::List(vec!["xy".into(), "z".into()]))
    );
}

//! Tree format: `<data><method/><topic/><value/></data>`.
//!
//! Values are rendered as text. A list becomes a run of `<item>` children;
//! maps and nested lists have no rendering. On decode every scalar comes back
//! as `Value::Text`.

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use super::malformed;
use crate::broker::message::{Envelope, Value};
use crate::utils::{BrokerError, Result};

const ROOT: &str = "data";

pub(super) fn encode(method: &str, topic: Option<&str>, value: &Value) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());

    write(&mut writer, Event::Decl(BytesDecl::new("1.0", None, None)))?;
    write(&mut writer, Event::Start(BytesStart::new(ROOT)))?;
    write_element(&mut writer, "method", method)?;
    if let Some(topic) = topic {
        write_element(&mut writer, "topic", topic)?;
    }

    write(&mut writer, Event::Start(BytesStart::new("value")))?;
    match value {
        Value::List(items) => {
            for item in items {
                let text = item
                    .as_scalar_text()
                    .ok_or(BrokerError::Unrepresentable("XML"))?;
                write_element(&mut writer, "item", &text)?;
            }
        }
        scalar => {
            let text = scalar
                .as_scalar_text()
                .ok_or(BrokerError::Unrepresentable("XML"))?;
            if !text.is_empty() {
                write(&mut writer, Event::Text(BytesText::new(&text)))?;
            }
        }
    }
    write(&mut writer, Event::End(BytesEnd::new("value")))?;
    write(&mut writer, Event::End(BytesEnd::new(ROOT)))?;

    Ok(writer.into_inner())
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| BrokerError::Io(std::io::Error::other(e.to_string())))
}

fn write_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    write(writer, Event::Start(BytesStart::new(name)))?;
    write(writer, Event::Text(BytesText::new(text)))?;
    write(writer, Event::End(BytesEnd::new(name)))
}

#[derive(Default)]
struct Fields {
    method: Option<String>,
    topic: Option<String>,
    value: Option<Value>,
}

impl Fields {
    fn take_root_attributes(&mut self, root: &BytesStart<'_>) -> Result<()> {
        for attr in root.attributes() {
            let attr = attr.map_err(malformed)?;
            let text = attr.unescape_value().map_err(malformed)?.into_owned();
            match attr.key.as_ref() {
                b"method" => self.method = Some(text),
                b"topic" => self.topic = Some(text),
                _ => {}
            }
        }
        Ok(())
    }

    fn open(&mut self, path: &[String], name: &str) {
        match (path_str(path).as_slice(), name) {
            ([_], "method") => self.method = Some(String::new()),
            ([_], "topic") => self.topic = Some(String::new()),
            ([_], "value") => self.value = Some(Value::Text(String::new())),
            ([_, "value"], "item") => {
                if !matches!(self.value, Some(Value::List(_))) {
                    self.value = Some(Value::List(Vec::new()));
                }
                if let Some(Value::List(items)) = &mut self.value {
                    items.push(Value::Text(String::new()));
                }
            }
            _ => {}
        }
    }

    /// Append a run of character data; comments may split one text into several runs.
    fn text(&mut self, path: &[String], text: &str) {
        match path_str(path).as_slice() {
            [_, "method"] => append(&mut self.method, text),
            [_, "topic"] => append(&mut self.topic, text),
            [_, "value"] => match &mut self.value {
                // whitespace between <item> children
                Some(Value::List(_)) => {}
                Some(Value::Text(current)) => current.push_str(text),
                _ => self.value = Some(Value::Text(text.to_string())),
            },
            [_, "value", "item"] => {
                if let Some(Value::List(items)) = &mut self.value {
                    if let Some(Value::Text(last)) = items.last_mut() {
                        last.push_str(text);
                    }
                }
            }
            _ => {}
        }
    }
}

fn append(field: &mut Option<String>, text: &str) {
    field.get_or_insert_with(String::new).push_str(text);
}

fn path_str(path: &[String]) -> Vec<&str> {
    path.iter().map(String::as_str).collect()
}

fn element_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}

pub(super) fn decode(bytes: &[u8]) -> Result<Envelope> {
    let text = std::str::from_utf8(bytes).map_err(malformed)?;
    let mut reader = Reader::from_str(text);

    let mut fields = Fields::default();
    let mut path: Vec<String> = Vec::new();
    let mut seen_root = false;

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(start) => {
                if path.is_empty() {
                    if seen_root {
                        return Err(malformed("more than one root element"));
                    }
                    seen_root = true;
                    fields.take_root_attributes(&start)?;
                }
                let name = element_name(&start);
                fields.open(&path, &name);
                path.push(name);
            }
            Event::Empty(start) => {
                if path.is_empty() {
                    if seen_root {
                        return Err(malformed("more than one root element"));
                    }
                    seen_root = true;
                    fields.take_root_attributes(&start)?;
                } else {
                    fields.open(&path, &element_name(&start));
                }
            }
            Event::Text(content) => {
                let content = content.unescape().map_err(malformed)?;
                fields.text(&path, &content);
            }
            Event::CData(content) => {
                let content = std::str::from_utf8(&content).map_err(malformed)?;
                fields.text(&path, content);
            }
            Event::End(_) => {
                path.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(malformed("missing root element"));
    }
    if !path.is_empty() {
        return Err(malformed(format!("unclosed element <{}>", path.join("/"))));
    }
    let method = fields
        .method
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .ok_or_else(|| malformed("missing `method`"))?;

    Ok(Envelope {
        method,
        topic: fields.topic,
        value: fields.value,
    })
}

//! XML-RPC document reader.
//!
//! The body is first collected into a small element tree; values are then
//! decoded from the tree. Text is kept untrimmed so that string values keep
//! their surrounding whitespace.

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use xml::reader::{ParserConfig, XmlEvent};

use super::XmlDecodeOptions;
use crate::error::CodecError;
use crate::value::{parse_datetime, Map, Value, ValueKind};

/// Deepest element nesting accepted in a document.
///
/// Decoding recurses once per level, so unbounded nesting would exhaust the
/// stack. Each array level costs three elements (`value`, `array`, `data`).
pub(crate) const MAX_DEPTH: usize = 256;

/// An element with its child elements and concatenated character data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Element {
    pub(crate) name: String,
    pub(crate) children: Vec<Element>,
    pub(crate) text: String,
}

impl Element {
    fn new(name: String) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    /// Returns the first child with the given name.
    pub(crate) fn child(&self, name: &str) -> Option<&Self> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Returns the first child with the given name, or a structure error.
    pub(crate) fn require(&self, name: &str) -> Result<&Self, CodecError> {
        self.child(name).ok_or_else(|| {
            CodecError::Structure(format!("<{}> is missing <{name}>", self.name))
        })
    }

    /// Fails unless this element has the expected name.
    pub(crate) fn expect_name(&self, name: &str) -> Result<(), CodecError> {
        if self.name == name {
            Ok(())
        } else {
            Err(CodecError::Structure(format!(
                "expected <{name}>, found <{}>",
                self.name
            )))
        }
    }

    /// Iterates over the children, failing on any child not named `name`.
    pub(crate) fn children_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = Result<&'a Self, CodecError>> + 'a {
        self.children.iter().map(move |child| {
            child.expect_name(name)?;
            Ok(child)
        })
    }
}

/// Parses a complete document into its root element.
pub(crate) fn parse_document(body: &[u8]) -> Result<Element, CodecError> {
    let reader = ParserConfig::new()
        .trim_whitespace(false)
        .whitespace_to_characters(true)
        .cdata_to_characters(true)
        .ignore_comments(true)
        .create_reader(body);

    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;

    for event in reader {
        match event? {
            XmlEvent::StartElement { name, .. } => {
                if stack.len() >= MAX_DEPTH {
                    return Err(CodecError::Structure(format!(
                        "document nests deeper than {MAX_DEPTH} elements"
                    )));
                }
                stack.push(Element::new(name.local_name));
            }
            XmlEvent::EndElement { .. } => {
                let element = stack.pop().ok_or_else(|| {
                    CodecError::Structure("unbalanced closing tag".to_string())
                })?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            XmlEvent::Characters(text) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            _ => {}
        }
    }

    root.ok_or_else(|| CodecError::Structure("document has no root element".to_string()))
}

/// Decodes a `<value>` element.
pub(crate) fn decode_value(element: &Element, options: XmlDecodeOptions) -> Result<Value, CodecError> {
    element.expect_name("value")?;

    match element.children.as_slice() {
        // An untyped value is a string.
        [] => Ok(Value::String(element.text.clone())),
        [typed] => decode_typed(typed, options),
        _ => Err(CodecError::Structure(
            "<value> holds more than one element".to_string(),
        )),
    }
}

fn decode_typed(element: &Element, options: XmlDecodeOptions) -> Result<Value, CodecError> {
    let text = element.text.trim();

    match element.name.as_str() {
        "nil" => Ok(Value::Null),
        "boolean" => match text {
            "1" => Ok(Value::Bool(true)),
            "0" => Ok(Value::Bool(false)),
            _ => Err(invalid(ValueKind::Bool, text)),
        },
        "int" | "i4" | "i8" => text
            .parse()
            .map(Value::Int)
            .map_err(|_| invalid(ValueKind::Int, text)),
        "double" => text
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Value::Float)
            .ok_or_else(|| invalid(ValueKind::Float, text)),
        "string" => Ok(Value::String(element.text.clone())),
        "base64" => {
            let compact: String = text.split_whitespace().collect();
            Ok(Value::Bytes(BASE64_STANDARD.decode(compact)?))
        }
        "dateTime.iso8601" => {
            if options.native_datetime {
                parse_datetime(text)
                    .map(Value::DateTime)
                    .ok_or_else(|| invalid(ValueKind::DateTime, text))
            } else {
                Ok(Value::String(text.to_string()))
            }
        }
        "array" => element
            .require("data")?
            .children_named("value")
            .map(|value| decode_value(value?, options))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        "struct" => {
            let mut map = Map::new();
            for member in element.children_named("member") {
                let member = member?;
                let name = member.require("name")?.text.clone();
                let value = decode_value(member.require("value")?, options)?;
                map.insert(name, value);
            }
            Ok(Value::Map(map))
        }
        other => Err(CodecError::UnknownType(other.to_string())),
    }
}

fn invalid(kind: ValueKind, text: &str) -> CodecError {
    CodecError::InvalidScalar {
        kind,
        text: text.to_string(),
    }
}

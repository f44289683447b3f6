//! XML-RPC document writer.

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use xml::writer::{EmitterConfig, EventWriter, XmlEvent};

use super::DATETIME_FORMAT;
use crate::error::CodecError;
use crate::value::Value;

/// Thin wrapper over an [`EventWriter`] that writes into memory.
pub(crate) struct XmlBuilder {
    writer: EventWriter<Vec<u8>>,
}

impl XmlBuilder {
    /// Creates a builder. Full documents carry an XML declaration.
    pub(crate) fn new(declaration: bool) -> Self {
        let writer = EmitterConfig::new()
            .write_document_declaration(declaration)
            .perform_indent(false)
            .create_writer(Vec::new());
        Self { writer }
    }

    pub(crate) fn start(&mut self, name: &str) -> Result<(), CodecError> {
        self.writer.write(XmlEvent::start_element(name))?;
        Ok(())
    }

    pub(crate) fn end(&mut self) -> Result<(), CodecError> {
        self.writer.write(XmlEvent::end_element())?;
        Ok(())
    }

    pub(crate) fn text(&mut self, text: &str) -> Result<(), CodecError> {
        if !text.is_empty() {
            self.writer.write(XmlEvent::characters(text))?;
        }
        Ok(())
    }

    /// Writes `<name>text</name>`.
    pub(crate) fn leaf(&mut self, name: &str, text: &str) -> Result<(), CodecError> {
        self.start(name)?;
        self.text(text)?;
        self.end()
    }

    /// Writes a `<value>` element.
    pub(crate) fn value(&mut self, value: &Value) -> Result<(), CodecError> {
        self.start("value")?;
        match value {
            Value::Null => {
                self.start("nil")?;
                self.end()?;
            }
            Value::Bool(b) => self.leaf("boolean", if *b { "1" } else { "0" })?,
            Value::Int(i) => {
                let tag = if i32::try_from(*i).is_ok() { "int" } else { "i8" };
                self.leaf(tag, &i.to_string())?;
            }
            Value::Float(f) => {
                if !f.is_finite() {
                    return Err(CodecError::NonFiniteFloat(*f));
                }
                self.leaf("double", &format!("{f}"))?;
            }
            Value::String(s) => self.leaf("string", s)?,
            Value::Bytes(bytes) => self.leaf("base64", &BASE64_STANDARD.encode(bytes))?,
            Value::DateTime(dt) => {
                self.leaf("dateTime.iso8601", &dt.format(DATETIME_FORMAT).to_string())?;
            }
            Value::List(items) => {
                self.start("array")?;
                self.start("data")?;
                for item in items {
                    self.value(item)?;
                }
                self.end()?;
                self.end()?;
            }
            Value::Map(map) => {
                self.start("struct")?;
                for (name, item) in map {
                    self.start("member")?;
                    self.leaf("name", name)?;
                    self.value(item)?;
                    self.end()?;
                }
                self.end()?;
            }
        }
        self.end()
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}

//! XML-RPC codec and message envelopes.
//!
//! # Messages
//!
//! ```text
//! <methodCall>
//!   <methodName>guru.test</methodName>
//!   <params><param><value>...</value></param></params>
//! </methodCall>
//!
//! <methodResponse><params><param><value>...</value></param></params></methodResponse>
//!
//! <methodResponse><fault><value><struct>
//!   faultCode: int, faultString: string
//! </struct></value></fault></methodResponse>
//! ```
//!
//! `<params>` is optional in a call. A response carries exactly one value.

mod reader;
mod writer;

use crate::error::CodecError;
use crate::fault::{Fault, CUSTOM_ERROR_BASE};
use crate::protocol::RpcRequest;
use crate::value::{Map, Value};

use reader::{parse_document, Element};
use writer::XmlBuilder;

/// Message used when a response is neither a result nor a fault.
pub const INVALID_RESPONSE_MESSAGE: &str = "Invalid XML-RPC response";

/// Timestamp layout of `<dateTime.iso8601>`.
pub const DATETIME_FORMAT: &str = "%Y%m%dT%H:%M:%S";

/// Options controlling how XML-RPC values are decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XmlDecodeOptions {
    /// Decode `<dateTime.iso8601>` into [`Value::DateTime`]. When unset the
    /// timestamp text is returned unchanged as a string.
    pub native_datetime: bool,
}

impl XmlDecodeOptions {
    /// Options used by the server when reading calls.
    pub const NATIVE: Self = Self {
        native_datetime: true,
    };
}

/// Encodes a standalone `<value>` fragment.
///
/// # Errors
///
/// Returns [`CodecError::NonFiniteFloat`] for NaN or infinite floats.
pub fn encode_value(value: &Value) -> Result<Vec<u8>, CodecError> {
    let mut builder = XmlBuilder::new(false);
    builder.value(value)?;
    Ok(builder.finish())
}

/// Decodes a standalone `<value>` fragment.
///
/// # Errors
///
/// Returns a [`CodecError`] for malformed XML or an unknown type tag.
pub fn decode_value(body: &[u8], options: XmlDecodeOptions) -> Result<Value, CodecError> {
    reader::decode_value(&parse_document(body)?, options)
}

/// Parses a `<methodCall>` document.
///
/// # Errors
///
/// Returns a [`CodecError`] if the body is not a well-formed call.
pub fn parse_call(body: &[u8]) -> Result<RpcRequest, CodecError> {
    let root = parse_document(body)?;
    root.expect_name("methodCall")?;

    let method = root.require("methodName")?.text.trim().to_string();
    if method.is_empty() {
        return Err(CodecError::Structure("<methodName> is empty".to_string()));
    }

    let params = match root.child("params") {
        Some(params) => decode_params(params, XmlDecodeOptions::NATIVE)?,
        None => Vec::new(),
    };

    Ok(RpcRequest::new(method, params))
}

fn decode_params(params: &Element, options: XmlDecodeOptions) -> Result<Vec<Value>, CodecError> {
    params
        .children_named("param")
        .map(|param| reader::decode_value(param?.require("value")?, options))
        .collect()
}

/// Encodes a successful `<methodResponse>`.
///
/// # Errors
///
/// Returns a [`CodecError`] if the result cannot be represented in XML-RPC.
pub fn encode_success(result: &Value) -> Result<Vec<u8>, CodecError> {
    let mut builder = XmlBuilder::new(true);
    builder.start("methodResponse")?;
    builder.start("params")?;
    builder.start("param")?;
    builder.value(result)?;
    builder.end()?;
    builder.end()?;
    builder.end()?;
    Ok(builder.finish())
}

/// Encodes a fault `<methodResponse>`.
///
/// # Errors
///
/// Returns a [`CodecError`] only if the XML writer fails.
pub fn encode_fault(fault: &Fault) -> Result<Vec<u8>, CodecError> {
    let mut fields = Map::new();
    fields.insert("faultCode".to_string(), Value::Int(i64::from(fault.code)));
    fields.insert("faultString".to_string(), Value::String(fault.message.clone()));

    let mut builder = XmlBuilder::new(true);
    builder.start("methodResponse")?;
    builder.start("fault")?;
    builder.value(&Value::Map(fields))?;
    builder.end()?;
    builder.end()?;
    Ok(builder.finish())
}

/// Builds the body of a `<methodCall>`.
///
/// # Errors
///
/// Returns a [`CodecError`] if an argument cannot be represented in XML-RPC.
pub fn build_call(method: &str, params: &[Value]) -> Result<Vec<u8>, CodecError> {
    let mut builder = XmlBuilder::new(true);
    builder.start("methodCall")?;
    builder.leaf("methodName", method)?;
    builder.start("params")?;
    for param in params {
        builder.start("param")?;
        builder.value(param)?;
        builder.end()?;
    }
    builder.end()?;
    builder.end()?;
    Ok(builder.finish())
}

/// Interprets a `<methodResponse>` body.
///
/// # Errors
///
/// Returns the server's fault, or a fault with the custom-error base and
/// [`INVALID_RESPONSE_MESSAGE`] when the body is not a recognised response.
pub fn parse_response(body: &[u8], options: XmlDecodeOptions) -> Result<Value, Fault> {
    let invalid =
        |detail: String| Fault::new(CUSTOM_ERROR_BASE, INVALID_RESPONSE_MESSAGE).with_data(detail);

    let root = parse_document(body).map_err(|e| invalid(e.to_string()))?;
    root.expect_name("methodResponse")
        .map_err(|e| invalid(e.to_string()))?;

    if let Some(fault) = root.child("fault") {
        return Err(parse_fault(fault).unwrap_or_else(invalid));
    }

    let mut values = root
        .require("params")
        .and_then(|params| decode_params(params, options))
        .map_err(|e| invalid(e.to_string()))?;

    match values.len() {
        1 => Ok(values.remove(0)),
        n => Err(invalid(format!("response carries {n} values, expected 1"))),
    }
}

fn parse_fault(fault: &Element) -> Result<Fault, String> {
    let value = fault
        .require("value")
        .and_then(|value| reader::decode_value(value, XmlDecodeOptions::default()))
        .map_err(|e| e.to_string())?;

    let fields = value.as_map().ok_or("fault value is not a struct")?;
    let code = fields
        .get("faultCode")
        .and_then(Value::as_i64)
        .and_then(|code| i32::try_from(code).ok())
        .ok_or("fault has no integer faultCode")?;
    let message = fields
        .get("faultString")
        .and_then(Value::as_str)
        .ok_or("fault has no faultString")?;

    Ok(Fault::new(code, message))
}

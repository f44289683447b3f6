//! JSON-RPC 2.0 codec and message envelopes.
//!
//! # Message Types
//!
//! - **Call**: `{"jsonrpc": "2.0", "method": ..., "params": [...], "id": ...}`
//! - **Notification**: a call without `id`; executed, never answered
//! - **Batch**: a non-empty array of calls, answered by an array of replies
//! - **Success**: `{"jsonrpc": "2.0", "result": ..., "id": ...}`
//! - **Error**: `{"jsonrpc": "2.0", "error": {"code": ..., "message": ...}, "id": ...}`
//!
//! # Values
//!
//! JSON has no byte-sequence or timestamp type. Bytes are sent as base64
//! strings and timestamps as `YYYY-MM-DDTHH:MM:SS` strings. Decoding turns
//! such strings back into timestamps only when
//! [`JsonDecodeOptions::native_datetime`] is set.

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use serde::Serialize;
use serde_json::{json, Map as JsonMap, Number, Value as JsonValue};

use crate::error::{CodecError, RpcError};
use crate::fault::{Fault, CUSTOM_ERROR_BASE};
use crate::protocol::{RequestId, RpcRequest};
use crate::value::{parse_datetime, Map, Value, ValueKind};

/// The only protocol version accepted.
pub const JSONRPC_VERSION: &str = "2.0";

/// Message used when a response is neither a success nor an error envelope.
pub const INVALID_RESPONSE_MESSAGE: &str = "Invalid JSON response";

/// Timestamp layout used on the wire.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Options controlling how JSON values are decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonDecodeOptions {
    /// Decode ISO-8601 timestamp strings into [`Value::DateTime`].
    pub native_datetime: bool,
}

/// Encodes a value as JSON.
///
/// # Errors
///
/// Returns [`CodecError::NonFiniteFloat`] for NaN or infinite floats.
pub fn encode_value(value: &Value) -> Result<JsonValue, CodecError> {
    Ok(match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Int(i) => JsonValue::from(*i),
        Value::Float(f) => Number::from_f64(*f)
            .map(JsonValue::Number)
            .ok_or(CodecError::NonFiniteFloat(*f))?,
        Value::String(s) => JsonValue::String(s.clone()),
        Value::Bytes(bytes) => JsonValue::String(BASE64_STANDARD.encode(bytes)),
        Value::DateTime(dt) => JsonValue::String(dt.format(DATETIME_FORMAT).to_string()),
        Value::List(items) => {
            JsonValue::Array(items.iter().map(encode_value).collect::<Result<_, _>>()?)
        }
        Value::Map(map) => {
            let mut object = JsonMap::with_capacity(map.len());
            for (key, item) in map {
                object.insert(key.clone(), encode_value(item)?);
            }
            JsonValue::Object(object)
        }
    })
}

/// Decodes a JSON value.
///
/// # Errors
///
/// Returns [`CodecError::InvalidScalar`] for an integer outside the `i64`
/// range.
pub fn decode_value(json: &JsonValue, options: JsonDecodeOptions) -> Result<Value, CodecError> {
    Ok(match json {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if n.is_f64() {
                match n.as_f64() {
                    Some(f) => Value::Float(f),
                    None => return Err(invalid_number(ValueKind::Float, n)),
                }
            } else {
                // An integer outside the i64 range.
                return Err(invalid_number(ValueKind::Int, n));
            }
        }
        JsonValue::String(s) => match options.native_datetime.then(|| parse_datetime(s)) {
            Some(Some(dt)) => Value::DateTime(dt),
            _ => Value::String(s.clone()),
        },
        JsonValue::Array(items) => Value::List(
            items
                .iter()
                .map(|item| decode_value(item, options))
                .collect::<Result<_, _>>()?,
        ),
        JsonValue::Object(object) => {
            let mut map = Map::with_capacity(object.len());
            for (key, item) in object {
                map.insert(key.clone(), decode_value(item, options)?);
            }
            Value::Map(map)
        }
    })
}

fn invalid_number(kind: ValueKind, n: &Number) -> CodecError {
    CodecError::InvalidScalar {
        kind,
        text: n.to_string(),
    }
}

/// A request body: one message or a batch of them.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonRpcPayload {
    /// A single message.
    Single(JsonValue),
    /// A non-empty batch.
    Batch(Vec<JsonValue>),
}

/// Parses a request body into one message or a batch.
///
/// # Errors
///
/// Returns [`RpcError::MalformedRequest`] for invalid JSON or an empty batch.
pub fn parse_payload(body: &[u8]) -> Result<JsonRpcPayload, RpcError> {
    let value: JsonValue = serde_json::from_slice(body).map_err(CodecError::from)?;

    match value {
        JsonValue::Array(items) if items.is_empty() => Err(RpcError::MalformedRequest(
            "empty batch request".to_string(),
        )),
        JsonValue::Array(items) => Ok(JsonRpcPayload::Batch(items)),
        other => Ok(JsonRpcPayload::Single(other)),
    }
}

/// A message that could not be turned into a request, with whatever ID could
/// be recovered for the error reply.
#[derive(Debug)]
pub struct RejectedCall {
    /// The message ID, if one was readable.
    pub id: Option<RequestId>,
    /// Why the message was rejected.
    pub error: RpcError,
}

impl RejectedCall {
    fn new(id: Option<RequestId>, message: impl Into<String>) -> Self {
        Self {
            id,
            error: RpcError::MalformedRequest(message.into()),
        }
    }
}

/// Validates one message and decodes it into a request.
///
/// # Errors
///
/// Returns a [`RejectedCall`] if the message is not a valid JSON-RPC 2.0 call.
pub fn parse_call(message: &JsonValue) -> Result<RpcRequest, RejectedCall> {
    let object = message
        .as_object()
        .ok_or_else(|| RejectedCall::new(None, "request must be a JSON object"))?;

    let id = match object.get("id") {
        None => None,
        Some(raw) => Some(
            serde_json::from_value::<RequestId>(raw.clone())
                .map_err(|_| RejectedCall::new(None, "id must be a string, an integer or null"))?,
        ),
    };

    let jsonrpc = object.get("jsonrpc").and_then(JsonValue::as_str);
    if jsonrpc != Some(JSONRPC_VERSION) {
        return Err(RejectedCall::new(id, "jsonrpc field must be \"2.0\""));
    }

    let method = match object.get("method") {
        Some(JsonValue::String(method)) if !method.is_empty() => method.clone(),
        Some(JsonValue::String(_)) => {
            return Err(RejectedCall::new(id, "method field cannot be empty"))
        }
        Some(_) => return Err(RejectedCall::new(id, "method field must be a string")),
        None => return Err(RejectedCall::new(id, "missing method field")),
    };

    let params = match object.get("params") {
        None | Some(JsonValue::Null) => Vec::new(),
        Some(JsonValue::Array(items)) => items
            .iter()
            .map(|item| decode_value(item, JsonDecodeOptions::default()))
            .collect::<Result<_, _>>()
            .map_err(|e| RejectedCall::new(id.clone(), e.to_string()))?,
        Some(JsonValue::Object(_)) => {
            return Err(RejectedCall::new(
                id,
                "named parameters are not supported, pass params as an array",
            ))
        }
        Some(_) => return Err(RejectedCall::new(id, "params must be an array")),
    };

    Ok(RpcRequest { method, params, id })
}

/// A successful JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    /// Always "2.0".
    pub jsonrpc: &'static str,

    /// The result of the call.
    pub result: JsonValue,

    /// The request ID this response corresponds to.
    pub id: RequestId,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcErrorData {
    /// The error code.
    pub code: i32,

    /// A short description of the error.
    pub message: String,

    /// Additional information about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
}

/// A JSON-RPC 2.0 error response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    /// Always "2.0".
    pub jsonrpc: &'static str,

    /// The error details.
    pub error: JsonRpcErrorData,

    /// The request ID, or `null` when it could not be determined.
    pub id: RequestId,
}

/// Either kind of reply.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum JsonRpcReply {
    /// A success response.
    Success(JsonRpcResponse),
    /// An error response.
    Error(JsonRpcError),
}

/// Wraps a result in a success envelope.
///
/// # Errors
///
/// Returns a [`CodecError`] if the result cannot be represented in JSON.
pub fn encode_success(result: &Value, id: RequestId) -> Result<JsonRpcReply, CodecError> {
    Ok(JsonRpcReply::Success(JsonRpcResponse {
        jsonrpc: JSONRPC_VERSION,
        result: encode_value(result)?,
        id,
    }))
}

/// Wraps a fault in an error envelope.
///
/// Extra data that cannot be represented in JSON is dropped.
#[must_use]
pub fn encode_fault(fault: &Fault, id: RequestId) -> JsonRpcReply {
    JsonRpcReply::Error(JsonRpcError {
        jsonrpc: JSONRPC_VERSION,
        error: JsonRpcErrorData {
            code: fault.code,
            message: fault.message.clone(),
            data: fault.data.as_ref().and_then(|data| encode_value(data).ok()),
        },
        id,
    })
}

/// Builds the body of a call.
///
/// # Errors
///
/// Returns a [`CodecError`] if an argument cannot be represented in JSON.
pub fn build_call(method: &str, params: &[Value], id: i64) -> Result<Vec<u8>, CodecError> {
    let params = params
        .iter()
        .map(encode_value)
        .collect::<Result<Vec<_>, _>>()?;

    let message = json!({
        "method": method,
        "params": params,
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
    });

    Ok(serde_json::to_vec(&message)?)
}

/// Interprets the response to the call sent with `id`.
///
/// Error responses may carry a `null` id, which servers use when they could
/// not read the request.
///
/// # Errors
///
/// Returns the server's fault for an error envelope, or a fault with the
/// custom-error base and [`INVALID_RESPONSE_MESSAGE`] when the body is not a
/// recognised envelope or answers a different request.
pub fn parse_response(body: &[u8], id: i64, options: JsonDecodeOptions) -> Result<Value, Fault> {
    let invalid = |detail: String| {
        Fault::new(CUSTOM_ERROR_BASE, INVALID_RESPONSE_MESSAGE).with_data(detail)
    };

    let message: JsonValue =
        serde_json::from_slice(body).map_err(|e| invalid(format!("invalid JSON: {e}")))?;
    let object = message
        .as_object()
        .ok_or_else(|| invalid("response is not a JSON object".to_string()))?;

    let error = object.get("error").filter(|error| !error.is_null());

    let id_matches = match object.get("id") {
        Some(JsonValue::Number(n)) => n.as_i64() == Some(id),
        Some(JsonValue::Null) => error.is_some(),
        _ => false,
    };
    if !id_matches {
        return Err(invalid(format!("response does not answer request {id}")));
    }

    if let Some(error) = error {
        return Err(parse_error_object(error).unwrap_or_else(invalid));
    }

    let result = object
        .get("result")
        .ok_or_else(|| invalid("response has neither result nor error".to_string()))?;

    decode_value(result, options).map_err(|e| invalid(e.to_string()))
}

fn parse_error_object(error: &JsonValue) -> Result<Fault, String> {
    let code = error
        .get("code")
        .and_then(JsonValue::as_i64)
        .and_then(|code| i32::try_from(code).ok())
        .ok_or_else(|| "error object has no integer code".to_string())?;
    let message = error
        .get("message")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| "error object has no message".to_string())?;

    let mut fault = Fault::new(code, message);
    if let Some(data) = error.get("data").filter(|data| !data.is_null()) {
        fault.data = decode_value(data, JsonDecodeOptions::default()).ok();
    }
    Ok(fault)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::METHOD_NOT_FOUND;
    use chrono::NaiveDate;

    fn roundtrip(value: &Value) -> Value {
        decode_value(&encode_value(value).unwrap(), JsonDecodeOptions::default()).unwrap()
    }

    #[test]
    fn parse_valid_request() {
        let message = json!({"method": "guru.test", "params": ["JSON"], "jsonrpc": "2.0", "id": 1});
        let request = parse_call(&message).unwrap();
        assert_eq!(request.method, "guru.test");
        assert_eq!(request.params, vec![Value::from("JSON")]);
        assert_eq!(request.id, Some(RequestId::Number(1)));
    }

    #[test]
    fn parse_string_id() {
        let message = json!({"jsonrpc": "2.0", "id": "abc-123", "method": "test"});
        let request = parse_call(&message).unwrap();
        assert_eq!(request.id, Some(RequestId::String("abc-123".to_string())));
        assert!(request.params.is_empty());
    }

    #[test]
    fn parse_notification() {
        let message = json!({"jsonrpc": "2.0", "method": "ping"});
        let request = parse_call(&message).unwrap();
        assert!(request.is_notification());
    }

    #[test]
    fn parse_missing_method() {
        let message = json!({"jsonrpc": "2.0", "id": 3, "params": []});
        let rejected = parse_call(&message).unwrap_err();
        assert_eq!(rejected.id, Some(RequestId::Number(3)));
        assert!(matches!(rejected.error, RpcError::MalformedRequest(_)));
    }

    #[test]
    fn parse_wrong_version() {
        let message = json!({"jsonrpc": "1.0", "id": 1, "method": "test"});
        assert!(parse_call(&message).is_err());
        let message = json!({"id": 1, "method": "test"});
        assert!(parse_call(&message).is_err());
    }

    #[test]
    fn parse_named_params_refused() {
        let message = json!({"jsonrpc": "2.0", "id": 1, "method": "test", "params": {"a": 1}});
        let rejected = parse_call(&message).unwrap_err();
        assert!(rejected.error.to_string().contains("named parameters"));
    }

    #[test]
    fn parse_non_object() {
        let rejected = parse_call(&json!(42)).unwrap_err();
        assert_eq!(rejected.id, None);
    }

    #[test]
    fn payload_invalid_json() {
        let err = parse_payload(b"not valid json").unwrap_err();
        assert!(matches!(err, RpcError::MalformedRequest(_)));
    }

    #[test]
    fn payload_batch() {
        let payload = parse_payload(br#"[{"jsonrpc":"2.0","method":"a","id":1}]"#).unwrap();
        assert!(matches!(payload, JsonRpcPayload::Batch(ref items) if items.len() == 1));
        assert!(parse_payload(b"[]").is_err());
    }

    #[test]
    fn serialise_success_response() {
        let reply = encode_success(&Value::from("Hello JSON!"), RequestId::Number(1)).unwrap();
        let json = serde_json::to_string(&reply).unwrap();
        assert!(json.contains(r#""jsonrpc":"2.0""#));
        assert!(json.contains(r#""id":1"#));
        assert!(json.contains(r#""result":"Hello JSON!""#));
        assert!(!json.contains("error"));
    }

    #[test]
    fn serialise_error_response() {
        let reply = encode_fault(&Fault::method_not_found("unknown.method"), RequestId::Null);
        let json = serde_json::to_string(&reply).unwrap();
        assert!(json.contains(r#""jsonrpc":"2.0""#));
        assert!(json.contains(r#""id":null"#));
        assert!(json.contains(r#""code":-32601"#));
        assert!(json.contains("no such method"));
        assert!(!json.contains("data"));
    }

    #[test]
    fn serialise_error_data() {
        let fault = Fault::new(7, "with data").with_data(Value::List(vec![Value::Int(1)]));
        let json = serde_json::to_value(encode_fault(&fault, RequestId::Number(2))).unwrap();
        assert_eq!(json["error"]["data"], json!([1]));
    }

    #[test]
    fn roundtrip_scalars() {
        for value in [
            Value::Null,
            Value::Bool(true),
            Value::Bool(false),
            Value::Int(-42),
            Value::Float(0.1),
            Value::from("héllo wörld ✓"),
        ] {
            assert_eq!(roundtrip(&value), value);
        }
    }

    #[test]
    fn integer_out_of_range_rejected() {
        let too_big = json!(18_446_744_073_709_551_615_u64);
        let error = decode_value(&too_big, JsonDecodeOptions::default()).unwrap_err();
        assert!(matches!(
            error,
            CodecError::InvalidScalar { kind: ValueKind::Int, ref text }
                if text == "18446744073709551615"
        ));

        assert_eq!(
            decode_value(&json!(i64::MIN), JsonDecodeOptions::default()).unwrap(),
            Value::Int(i64::MIN)
        );
    }

    #[test]
    fn integer_out_of_range_in_params_is_malformed() {
        let message: JsonValue = serde_json::from_str(
            r#"{"jsonrpc": "2.0", "method": "echo", "params": [18446744073709551615], "id": 1}"#,
        )
        .unwrap();
        let rejected = parse_call(&message).unwrap_err();
        assert!(matches!(rejected.error, RpcError::MalformedRequest(_)));
        assert_eq!(rejected.id, Some(RequestId::Number(1)));
    }

    #[test]
    fn roundtrip_containers() {
        let list = Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(roundtrip(&list), list);

        let map: Value = [("x", 1), ("y", 2), ("z", 3)].into_iter().collect();
        assert_eq!(roundtrip(&map), map);
    }

    #[test]
    fn bytes_encode_as_base64() {
        let encoded = encode_value(&Value::bytes(b"abcde".to_vec())).unwrap();
        assert_eq!(encoded, json!("YWJjZGU="));
    }

    #[test]
    fn datetime_decodes_only_when_enabled() {
        let dt = NaiveDate::from_ymd_opt(1987, 6, 2)
            .unwrap()
            .and_hms_opt(8, 45, 0)
            .unwrap();
        let encoded = encode_value(&Value::DateTime(dt)).unwrap();
        assert_eq!(encoded, json!("1987-06-02T08:45:00"));

        let plain = decode_value(&encoded, JsonDecodeOptions::default()).unwrap();
        assert_eq!(plain, Value::from("1987-06-02T08:45:00"));

        let native = decode_value(&encoded, JsonDecodeOptions { native_datetime: true }).unwrap();
        assert_eq!(native, Value::DateTime(dt));
    }

    #[test]
    fn non_finite_float_fails() {
        assert!(matches!(
            encode_value(&Value::Float(f64::INFINITY)),
            Err(CodecError::NonFiniteFloat(_))
        ));
    }

    #[test]
    fn build_call_shape() {
        let body = build_call("guru.test", &[Value::from("JSON")], 5).unwrap();
        let message: JsonValue = serde_json::from_slice(&body).unwrap();
        assert_eq!(message["method"], "guru.test");
        assert_eq!(message["params"], json!(["JSON"]));
        assert_eq!(message["jsonrpc"], "2.0");
        assert_eq!(message["id"], 5);
    }

    #[test]
    fn parse_response_result() {
        let body = br#"{"jsonrpc":"2.0","result":[1,2,3],"id":1}"#;
        let value = parse_response(body, 1, JsonDecodeOptions::default()).unwrap();
        assert_eq!(value, Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]));
    }

    #[test]
    fn parse_response_null_error_is_success() {
        let body = br#"{"jsonrpc":"2.0","result":true,"error":null,"id":1}"#;
        let value = parse_response(body, 1, JsonDecodeOptions::default()).unwrap();
        assert_eq!(value, Value::Bool(true));
    }

    #[test]
    fn parse_response_fault() {
        let body = br#"{"jsonrpc":"2.0","error":{"code":-32601,"message":"no such method"},"id":1}"#;
        let fault = parse_response(body, 1, JsonDecodeOptions::default()).unwrap_err();
        assert_eq!(fault.code, METHOD_NOT_FOUND);
        assert_eq!(fault.message, "no such method");
    }

    #[test]
    fn parse_response_null_id_only_for_errors() {
        let body = br#"{"jsonrpc":"2.0","error":{"code":-32099,"message":"bad body"},"id":null}"#;
        let fault = parse_response(body, 7, JsonDecodeOptions::default()).unwrap_err();
        assert_eq!(fault.message, "bad body");

        let body = br#"{"jsonrpc":"2.0","result":1,"id":null}"#;
        let fault = parse_response(body, 7, JsonDecodeOptions::default()).unwrap_err();
        assert_eq!(fault.message, INVALID_RESPONSE_MESSAGE);
    }

    #[test]
    fn parse_response_id_mismatch() {
        let bodies: [&[u8]; 3] = [
            br#"{"jsonrpc":"2.0","result":1,"id":2}"#,
            br#"{"jsonrpc":"2.0","result":1,"id":"1"}"#,
            br#"{"jsonrpc":"2.0","error":{"code":1,"message":"other"},"id":2}"#,
        ];
        for body in bodies {
            let fault = parse_response(body, 1, JsonDecodeOptions::default()).unwrap_err();
            assert_eq!(fault.code, CUSTOM_ERROR_BASE);
            assert_eq!(fault.message, INVALID_RESPONSE_MESSAGE);
        }
    }

    #[test]
    fn parse_response_invalid_envelope() {
        let bodies: [&[u8]; 4] = [
            br#"{"xxx":"vvv"}"#,
            b"<html></html>",
            b"[1, 2]",
            br#"{"error":{"message":"no code"}}"#,
        ];
        for body in bodies {
            let fault = parse_response(body, 1, JsonDecodeOptions::default()).unwrap_err();
            assert_eq!(fault.code, CUSTOM_ERROR_BASE);
            assert!(fault.message.contains("Invalid JSON response"));
        }
    }
}

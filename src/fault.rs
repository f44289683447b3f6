//! Faults: the structured errors returned in-band to RPC clients.
//!
//! Both protocols share one numbering space. The JSON-RPC 2.0 reserved codes
//! cover protocol-level problems; every application or internal error uses
//! [`CUSTOM_ERROR_BASE`], which sits at the bottom of the server-error range
//! so it can never collide with a reserved code.
//!
//! The dispatcher itself only emits [`METHOD_NOT_FOUND`] and
//! [`CUSTOM_ERROR_BASE`]. The other reserved codes are exported for handlers
//! that want to report them explicitly through [`Fault::from_code`]; such
//! faults reach the client unchanged.

use thiserror::Error;

use crate::value::Value;

/// Invalid JSON or XML was received.
pub const PARSE_ERROR: i32 = ErrorCode::ParseError.code();
/// The payload is not a valid request object.
pub const INVALID_REQUEST: i32 = ErrorCode::InvalidRequest.code();
/// The procedure does not exist or is not exposed on this protocol.
pub const METHOD_NOT_FOUND: i32 = ErrorCode::MethodNotFound.code();
/// Invalid procedure parameters.
pub const INVALID_PARAMS: i32 = ErrorCode::InvalidParams.code();
/// Internal error.
pub const INTERNAL_ERROR: i32 = ErrorCode::InternalError.code();
/// First code of the application-defined range.
pub const CUSTOM_ERROR_BASE: i32 = ErrorCode::CustomBase.code();
/// Last code of the application-defined range.
pub const CUSTOM_ERROR_MAX: i32 = -32000;

/// Well-known fault codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    /// Code shared by all otherwise unclassified failures.
    CustomBase,
    /// Any other code, typically chosen by a handler.
    Custom(i32),
}

impl ErrorCode {
    /// Returns the numeric code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::CustomBase => -32099,
            Self::Custom(code) => code,
        }
    }
}

/// A structured error carried in the response body.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Error {code}: {message}")]
pub struct Fault {
    /// Numeric fault code.
    pub code: i32,
    /// Human-readable description.
    pub message: String,
    /// Optional structured detail.
    pub data: Option<Value>,
}

impl Fault {
    /// Creates a fault with an explicit numeric code.
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Creates a fault from a well-known code.
    #[must_use]
    pub fn from_code(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code.code(), message)
    }

    /// Creates a fault in the custom-error range.
    #[must_use]
    pub fn custom(message: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::CustomBase, message)
    }

    /// Creates the fault reported for unknown procedure names.
    ///
    /// The message always contains `no such method`; clients match on it.
    #[must_use]
    pub fn method_not_found(name: &str) -> Self {
        Self::from_code(
            ErrorCode::MethodNotFound,
            format!("Method not found: no such method \"{name}\""),
        )
    }

    /// Attaches structured detail.
    #[must_use]
    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = Some(data.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_codes() {
        assert_eq!(PARSE_ERROR, -32700);
        assert_eq!(INVALID_REQUEST, -32600);
        assert_eq!(METHOD_NOT_FOUND, -32601);
        assert_eq!(INVALID_PARAMS, -32602);
        assert_eq!(INTERNAL_ERROR, -32603);
        assert_eq!(CUSTOM_ERROR_BASE, -32099);
    }

    #[test]
    fn custom_base_is_outside_reserved_codes() {
        for reserved in [PARSE_ERROR, INVALID_REQUEST, METHOD_NOT_FOUND, INVALID_PARAMS, INTERNAL_ERROR] {
            assert_ne!(reserved, CUSTOM_ERROR_BASE);
        }
        assert!((CUSTOM_ERROR_BASE..=CUSTOM_ERROR_MAX).contains(&CUSTOM_ERROR_BASE));
    }

    #[test]
    fn method_not_found_message() {
        let fault = Fault::method_not_found("non.existing.method");
        assert_eq!(fault.code, METHOD_NOT_FOUND);
        assert!(fault.message.contains("no such method"));
        assert!(fault.message.contains("non.existing.method"));
        assert!(fault.to_string().contains("no such method"));
    }

    #[test]
    fn display_includes_code() {
        let fault = Fault::custom("boom");
        assert_eq!(fault.to_string(), "Error -32099: boom");
    }

    #[test]
    fn raw_codes_pass_through() {
        let fault = Fault::new(42, "answer").with_data("extra");
        assert_eq!(fault.code, 42);
        assert_eq!(fault.data, Some(Value::from("extra")));
    }
}

//! Wire protocols: request parsing, value codecs and response envelopes.
//!
//! ```text
//!   body ──▶ parse ──▶ RpcRequest ──▶ Dispatcher ──▶ Result<Value, Fault>
//!                                                          │
//!   body ◀── encode_success / encode_fault ◀───────────────┘
//! ```
//!
//! Each protocol module exposes both the server half (parse a call, encode a
//! response) and the client half (build a call, parse a response).

pub mod jsonrpc;
pub mod xmlrpc;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A supported RPC wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// JSON-RPC 2.0.
    JsonRpc,
    /// XML-RPC.
    XmlRpc,
}

impl Protocol {
    /// Selects a protocol from an HTTP `Content-Type` header value.
    ///
    /// Media type parameters such as `charset` are ignored.
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let media_type = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match media_type.as_str() {
            "application/json" | "application/json-rpc" | "application/jsonrequest" => {
                Some(Self::JsonRpc)
            }
            "text/xml" | "application/xml" => Some(Self::XmlRpc),
            _ => None,
        }
    }

    /// Returns the content type used for bodies of this protocol.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::JsonRpc => "application/json",
            Self::XmlRpc => "text/xml",
        }
    }

    /// Returns a short human-readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::JsonRpc => "JSON-RPC",
            Self::XmlRpc => "XML-RPC",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of protocols, used to restrict where procedures are exposed and
/// which protocols the endpoint accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolSet {
    json_rpc: bool,
    xml_rpc: bool,
}

impl ProtocolSet {
    /// Both protocols.
    pub const ALL: Self = Self {
        json_rpc: true,
        xml_rpc: true,
    };

    /// No protocol.
    pub const NONE: Self = Self {
        json_rpc: false,
        xml_rpc: false,
    };

    /// A set holding a single protocol.
    #[must_use]
    pub const fn only(protocol: Protocol) -> Self {
        Self::NONE.with(protocol)
    }

    /// Returns a copy of this set that also holds `protocol`.
    #[must_use]
    pub const fn with(mut self, protocol: Protocol) -> Self {
        match protocol {
            Protocol::JsonRpc => self.json_rpc = true,
            Protocol::XmlRpc => self.xml_rpc = true,
        }
        self
    }

    #[must_use]
    pub const fn contains(self, protocol: Protocol) -> bool {
        match protocol {
            Protocol::JsonRpc => self.json_rpc,
            Protocol::XmlRpc => self.xml_rpc,
        }
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        !self.json_rpc && !self.xml_rpc
    }
}

impl Default for ProtocolSet {
    fn default() -> Self {
        Self::ALL
    }
}

/// A JSON-RPC request identifier, echoed in the response.
///
/// XML-RPC has no equivalent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric request ID.
    Number(i64),
    /// String request ID.
    String(String),
    /// Explicit `null`, also used in error responses when the ID is unknown.
    Null,
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Null => f.write_str("null"),
        }
    }
}

/// A decoded call, independent of the wire protocol it arrived on.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    /// Dotted procedure name.
    pub method: String,
    /// Positional arguments, in wire order.
    pub params: Vec<Value>,
    /// Call identifier. `None` for XML-RPC and for JSON-RPC notifications.
    pub id: Option<RequestId>,
}

impl RpcRequest {
    /// Creates a request without an identifier.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            params,
            id: None,
        }
    }

    /// Returns `true` for a JSON-RPC notification.
    #[must_use]
    pub const fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_selection() {
        assert_eq!(
            Protocol::from_content_type("application/json"),
            Some(Protocol::JsonRpc)
        );
        assert_eq!(
            Protocol::from_content_type("application/json; charset=utf-8"),
            Some(Protocol::JsonRpc)
        );
        assert_eq!(Protocol::from_content_type("text/xml"), Some(Protocol::XmlRpc));
        assert_eq!(
            Protocol::from_content_type("Application/XML"),
            Some(Protocol::XmlRpc)
        );
        assert_eq!(Protocol::from_content_type("text/plain"), None);
        assert_eq!(Protocol::from_content_type(""), None);
    }

    #[test]
    fn protocol_set_membership() {
        let xml_only = ProtocolSet::only(Protocol::XmlRpc);
        assert!(xml_only.contains(Protocol::XmlRpc));
        assert!(!xml_only.contains(Protocol::JsonRpc));
        assert!(ProtocolSet::NONE.is_empty());
        assert!(ProtocolSet::default().contains(Protocol::JsonRpc));
        assert_eq!(xml_only.with(Protocol::JsonRpc), ProtocolSet::ALL);
    }

    #[test]
    fn request_id_serde() {
        let number: RequestId = serde_json::from_str("7").unwrap();
        let string: RequestId = serde_json::from_str(r#""abc""#).unwrap();
        let null: RequestId = serde_json::from_str("null").unwrap();
        assert_eq!(number, RequestId::Number(7));
        assert_eq!(string, RequestId::String("abc".to_string()));
        assert_eq!(null, RequestId::Null);
        assert_eq!(serde_json::to_string(&RequestId::Null).unwrap(), "null");
    }

    #[test]
    fn request_id_display() {
        assert_eq!(format!("{}", RequestId::Number(42)), "42");
        assert_eq!(format!("{}", RequestId::String("abc".to_string())), "abc");
        assert_eq!(format!("{}", RequestId::Null), "null");
    }
}

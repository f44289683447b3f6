//! Error types for duorpc.
//!
//! Everything raised while serving a request is recovered at the dispatch
//! boundary: [`RpcError`] is the server-side taxonomy and always converts into
//! a [`Fault`] that is encoded in-band. Client-side errors live in
//! [`crate::client::ClientError`].

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::fault::Fault;
use crate::value::{ValueKind, ValueTypeError};

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// Failures converting between [`crate::value::Value`] and a wire format.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The body is not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The body is not well-formed XML.
    #[error("invalid XML: {0}")]
    XmlRead(#[from] xml::reader::Error),

    /// Writing an XML document failed.
    #[error("failed to write XML: {0}")]
    XmlWrite(#[from] xml::writer::Error),

    /// The document does not have the expected element structure.
    #[error("unexpected document structure: {0}")]
    Structure(String),

    /// An XML-RPC `<value>` uses a type tag this codec does not know.
    #[error("unknown value type <{0}>")]
    UnknownType(String),

    /// A scalar's text could not be read as its declared kind.
    #[error("invalid {kind} value: {text:?}")]
    InvalidScalar {
        /// The declared kind.
        kind: ValueKind,
        /// The offending text.
        text: String,
    },

    /// NaN and infinities have no representation in either protocol.
    #[error("non-finite float {0} cannot be encoded")]
    NonFiniteFloat(f64),

    /// A `<base64>` payload is not valid base64.
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Errors returned by procedure handlers.
#[derive(Error, Debug)]
pub enum ProcedureError {
    /// A fault chosen by the handler. Passed to the client unchanged.
    #[error(transparent)]
    Fault(#[from] Fault),

    /// The arguments do not match what the handler expects.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// Any other handler failure.
    #[error("{0}")]
    Failed(String),
}

impl ProcedureError {
    /// Wraps any displayable error as a handler failure.
    pub fn failed(error: impl std::fmt::Display) -> Self {
        Self::Failed(error.to_string())
    }
}

impl From<ValueTypeError> for ProcedureError {
    fn from(error: ValueTypeError) -> Self {
        Self::InvalidParams(error.to_string())
    }
}

/// Errors raised while building a [`crate::registry::Registry`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A procedure with the same name is already registered.
    #[error("procedure already registered: {name}")]
    DuplicateProcedure {
        /// The contested name.
        name: String,
    },

    /// The name is empty or contains whitespace.
    #[error("invalid procedure name: {name:?}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },
}

/// Everything that can go wrong between receiving a request body and
/// producing a result.
#[derive(Error, Debug)]
pub enum RpcError {
    /// The body cannot be parsed per the protocol grammar.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// No procedure with this name is exposed on the calling protocol.
    #[error("no such method: {0}")]
    MethodNotFound(String),

    /// The handler failed.
    #[error(transparent)]
    Handler(#[from] ProcedureError),

    /// The handler's result has no representation in the calling protocol.
    #[error("failed to encode result: {0}")]
    Encode(#[source] CodecError),
}

impl RpcError {
    /// Converts the error into the fault reported to the client.
    ///
    /// Handler-supplied faults keep their code; method lookup failures use
    /// the reserved method-not-found code; everything else uses the
    /// custom-error base.
    #[must_use]
    pub fn into_fault(self) -> Fault {
        match self {
            Self::MethodNotFound(name) => Fault::method_not_found(&name),
            Self::Handler(ProcedureError::Fault(fault)) => fault,
            other => Fault::custom(other.to_string()),
        }
    }
}

impl From<CodecError> for RpcError {
    fn from(error: CodecError) -> Self {
        Self::MalformedRequest(error.to_string())
    }
}

/// Errors that stop the HTTP endpoint.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The listening socket could not be bound.
    #[error("failed to bind to {addr}")]
    Bind {
        /// The requested address.
        addr: SocketAddr,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Signal handlers could not be installed.
    #[error("failed to install signal handler")]
    Signal(#[source] std::io::Error),

    /// Any other socket error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

//! Client proxies for calling remote procedures.
//!
//! Both proxies expose the same shape: `call(method, args)` returns the
//! decoded result, or a [`ClientError`] that keeps transport failures apart
//! from in-band faults.
//!
//! ```no_run
//! use duorpc::client::JsonRpcClient;
//! use duorpc::value::Value;
//!
//! # async fn demo() -> Result<(), duorpc::client::ClientError> {
//! let client = JsonRpcClient::new("http://127.0.0.1:8080/rpc")?;
//! let greeting = client.call("guru.test", vec![Value::from("JSON")]).await?;
//! assert_eq!(greeting.as_str(), Some("Hello JSON!"));
//! # Ok(())
//! # }
//! ```

mod jsonrpc;
mod transport;
mod xmlrpc;

pub use jsonrpc::JsonRpcClient;
pub use transport::DEFAULT_TIMEOUT;
pub use xmlrpc::XmlRpcClient;

use std::time::Duration;

use thiserror::Error;

use crate::error::CodecError;
use crate::fault::Fault;

/// Errors returned by the client proxies.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The server answered with a status other than 200.
    #[error("transport error: HTTP status {status}")]
    Protocol {
        /// The HTTP status code.
        status: u16,
    },

    /// The server returned a fault, or its response could not be understood.
    #[error(transparent)]
    Fault(#[from] Fault),

    /// The request could not be sent.
    #[error("HTTP request failed: {0}")]
    Http(#[from] hyper_util::client::legacy::Error),

    /// The response body could not be read.
    #[error("failed to read response body: {0}")]
    Body(#[from] hyper::Error),

    /// No complete response within the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The endpoint URL is not usable.
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An argument cannot be represented in the protocol.
    #[error("failed to encode request: {0}")]
    Encode(#[from] CodecError),
}

impl ClientError {
    /// Returns the fault if this error is one.
    #[must_use]
    pub const fn as_fault(&self) -> Option<&Fault> {
        match self {
            Self::Fault(fault) => Some(fault),
            _ => None,
        }
    }
}

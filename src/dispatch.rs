//! Request dispatch.
//!
//! The [`Dispatcher`] owns the registry and runs the whole pipeline for one
//! request body: parse, resolve, invoke, encode. Every failure past the HTTP
//! layer ends up as an in-band fault, so [`Dispatcher::handle`] never fails.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde_json::Value as JsonValue;

use crate::error::{ProcedureError, RpcError};
use crate::fault::Fault;
use crate::protocol::jsonrpc::{self, JsonRpcPayload, JsonRpcReply};
use crate::protocol::{xmlrpc, Protocol, RequestId, RpcRequest};
use crate::registry::Registry;
use crate::value::{Params, Value};

/// Sent if a JSON-RPC reply cannot be serialised at all.
const JSON_FALLBACK: &[u8] =
    br#"{"jsonrpc":"2.0","error":{"code":-32099,"message":"failed to encode response"},"id":null}"#;

/// Sent if an XML-RPC reply cannot be written at all.
const XML_FALLBACK: &[u8] = b"<?xml version=\"1.0\"?><methodResponse><fault><value><struct>\
<member><name>faultCode</name><value><int>-32099</int></value></member>\
<member><name>faultString</name><value><string>failed to encode response</string></value></member>\
</struct></value></fault></methodResponse>";

/// What a procedure sees of the call it is serving.
#[derive(Debug, Clone, Copy)]
pub struct CallContext<'a> {
    protocol: Protocol,
    dispatcher: &'a Dispatcher,
}

impl<'a> CallContext<'a> {
    /// The protocol the call arrived on.
    #[must_use]
    pub const fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// The dispatcher serving the call, for procedures that make nested calls.
    #[must_use]
    pub const fn dispatcher(&self) -> &'a Dispatcher {
        self.dispatcher
    }

    #[must_use]
    pub const fn registry(&self) -> &'a Registry {
        &self.dispatcher.registry
    }
}

/// An encoded response body ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

/// Resolves and invokes procedures.
#[derive(Debug)]
pub struct Dispatcher {
    registry: Registry,
}

impl Dispatcher {
    #[must_use]
    pub const fn new(registry: Registry) -> Self {
        Self { registry }
    }

    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Calls a procedure by name as if it had arrived on `protocol`.
    ///
    /// # Errors
    ///
    /// Returns the fault the client would receive.
    pub fn call(&self, protocol: Protocol, name: &str, args: Vec<Value>) -> Result<Value, Fault> {
        self.invoke(protocol, name, args).map_err(|error| {
            let fault = error.into_fault();
            tracing::info!(method = %name, code = fault.code, fault = %fault.message, "Call failed");
            fault
        })
    }

    /// Runs a parsed request.
    ///
    /// # Errors
    ///
    /// Returns the fault the client would receive.
    pub fn dispatch(&self, protocol: Protocol, request: RpcRequest) -> Result<Value, Fault> {
        tracing::debug!(
            %protocol,
            method = %request.method,
            args = request.params.len(),
            "Dispatching call"
        );
        self.call(protocol, &request.method, request.params)
    }

    fn invoke(&self, protocol: Protocol, name: &str, args: Vec<Value>) -> Result<Value, RpcError> {
        let procedure = self
            .registry
            .lookup(name)
            .filter(|procedure| procedure.is_exposed_on(protocol))
            .ok_or_else(|| RpcError::MethodNotFound(name.to_string()))?;

        let context = CallContext {
            protocol,
            dispatcher: self,
        };
        let params = Params::new(args);

        match catch_unwind(AssertUnwindSafe(|| procedure.invoke(&context, &params))) {
            Ok(result) => result.map_err(RpcError::from),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(method = %name, panic = %message, "Procedure panicked");
                Err(RpcError::Handler(ProcedureError::Failed(format!(
                    "procedure panicked: {message}"
                ))))
            }
        }
    }

    /// Runs the full pipeline for one request body.
    ///
    /// Returns `None` when nothing should be sent back, which only happens
    /// for JSON-RPC payloads made up entirely of notifications.
    #[must_use]
    pub fn handle(&self, protocol: Protocol, body: &[u8]) -> Option<HttpReply> {
        let body = match protocol {
            Protocol::JsonRpc => self.handle_json(body)?,
            Protocol::XmlRpc => self.handle_xml(body),
        };
        Some(HttpReply {
            content_type: protocol.content_type(),
            body,
        })
    }

    /// Encodes a fault raised outside the pipeline, e.g. by a worker that
    /// died before producing a reply.
    #[must_use]
    pub fn fault_reply(protocol: Protocol, fault: &Fault) -> HttpReply {
        let body = match protocol {
            Protocol::JsonRpc => {
                serde_json::to_vec(&jsonrpc::encode_fault(fault, RequestId::Null))
                    .unwrap_or_else(|_| JSON_FALLBACK.to_vec())
            }
            Protocol::XmlRpc => {
                xmlrpc::encode_fault(fault).unwrap_or_else(|_| XML_FALLBACK.to_vec())
            }
        };
        HttpReply {
            content_type: protocol.content_type(),
            body,
        }
    }

    fn handle_json(&self, body: &[u8]) -> Option<Vec<u8>> {
        let encoded = match jsonrpc::parse_payload(body) {
            Err(error) => {
                tracing::debug!(error = %error, "Rejected JSON-RPC payload");
                serde_json::to_vec(&jsonrpc::encode_fault(&error.into_fault(), RequestId::Null))
            }
            Ok(JsonRpcPayload::Single(message)) => {
                serde_json::to_vec(&self.handle_json_message(&message)?)
            }
            Ok(JsonRpcPayload::Batch(messages)) => {
                tracing::debug!(size = messages.len(), "Dispatching batch");
                let replies: Vec<JsonRpcReply> = messages
                    .iter()
                    .filter_map(|message| self.handle_json_message(message))
                    .collect();
                if replies.is_empty() {
                    return None;
                }
                serde_json::to_vec(&replies)
            }
        };

        Some(encoded.unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to serialise JSON-RPC reply");
            JSON_FALLBACK.to_vec()
        }))
    }

    fn handle_json_message(&self, message: &JsonValue) -> Option<JsonRpcReply> {
        let request = match jsonrpc::parse_call(message) {
            Ok(request) => request,
            Err(rejected) => {
                tracing::debug!(error = %rejected.error, "Rejected JSON-RPC message");
                return Some(jsonrpc::encode_fault(
                    &rejected.error.into_fault(),
                    rejected.id.unwrap_or(RequestId::Null),
                ));
            }
        };

        let id = request.id.clone();
        let outcome = self.dispatch(Protocol::JsonRpc, request);
        let id = id?;

        Some(match outcome {
            Ok(value) => jsonrpc::encode_success(&value, id.clone()).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Result cannot be encoded as JSON");
                jsonrpc::encode_fault(&RpcError::Encode(e).into_fault(), id)
            }),
            Err(fault) => jsonrpc::encode_fault(&fault, id),
        })
    }

    fn handle_xml(&self, body: &[u8]) -> Vec<u8> {
        let outcome = match xmlrpc::parse_call(body) {
            Ok(request) => self.dispatch(Protocol::XmlRpc, request),
            Err(e) => {
                tracing::debug!(error = %e, "Rejected XML-RPC call");
                Err(RpcError::from(e).into_fault())
            }
        };

        let encoded = match outcome {
            Ok(value) => xmlrpc::encode_success(&value).or_else(|e| {
                tracing::warn!(error = %e, "Result cannot be encoded as XML-RPC");
                xmlrpc::encode_fault(&RpcError::Encode(e).into_fault())
            }),
            Err(fault) => xmlrpc::encode_fault(&fault),
        };

        encoded.unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to write XML-RPC reply");
            XML_FALLBACK.to_vec()
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

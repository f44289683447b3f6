//! duorpc: a JSON-RPC 2.0 and XML-RPC server dispatch core
//!
//! One registry of procedures is served over both protocols from a single
//! HTTP endpoint. The protocol is chosen per request from the `Content-Type`
//! header; everything after parsing is shared.
//!
//! # Architecture
//!
//! ```text
//!   HTTP POST ──▶ server ──▶ protocol::{jsonrpc, xmlrpc}::parse ──▶ RpcRequest
//!                                                                     │
//!                                     dispatch::Dispatcher ◀──────────┘
//!                                              │ registry lookup, invoke
//!                                              ▼
//!   HTTP 200 ◀── protocol::*::encode_success / encode_fault ◀── Result<Value, Fault>
//! ```
//!
//! Application errors never change the HTTP status: they are returned in the
//! body as a [`fault::Fault`]. Non-200 statuses are reserved for transport
//! problems such as a wrong path or an oversized body.
//!
//! # Modules
//!
//! - [`value`]: Dynamic values and typed argument access
//! - [`protocol`]: Wire codecs and envelopes for both protocols
//! - [`registry`]: Procedure table and signatures
//! - [`system`]: `system.*` introspection procedures
//! - [`dispatch`]: Request pipeline and fault mapping
//! - [`server`]: HTTP endpoint
//! - [`client`]: Client proxies for both protocols
//! - [`demo`]: Demonstration procedures
//! - [`config`]: Configuration loading and validation
//! - [`fault`], [`error`]: Fault codes and error types

pub mod client;
pub mod config;
pub mod demo;
pub mod dispatch;
pub mod error;
pub mod fault;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod system;
pub mod value;

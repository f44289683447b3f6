//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use std::net::SocketAddr;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::protocol::{Protocol, ProtocolSet};
use crate::server::{EndpointOptions, DEFAULT_MAX_BODY_SIZE, DEFAULT_PATH};

/// Log levels accepted by `logging.level`.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// HTTP endpoint settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Which protocols the endpoint accepts.
    #[serde(default)]
    pub protocols: ProtocolsConfig,

    /// Introspection settings.
    #[serde(default)]
    pub introspection: IntrospectionConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_address()?;

        if !self.server.endpoint.starts_with('/') {
            return Err(invalid(format!(
                "Invalid endpoint '{}'. Must start with '/'",
                self.server.endpoint
            )));
        }

        if self.server.max_body_size == 0 {
            return Err(invalid("max_body_size must be greater than zero".to_string()));
        }

        if self.protocols.enabled().is_empty() {
            return Err(invalid(
                "At least one of protocols.json_rpc and protocols.xml_rpc must be enabled"
                    .to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(invalid(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }

    /// Parses `server.bind_address`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the address is not a socket address.
    pub fn bind_address(&self) -> Result<SocketAddr, ConfigError> {
        self.server.bind_address.parse().map_err(|_| {
            invalid(format!(
                "Invalid bind_address '{}'. Expected host:port, e.g. 127.0.0.1:8080",
                self.server.bind_address
            ))
        })
    }

    /// Returns the endpoint settings derived from this configuration.
    #[must_use]
    pub fn endpoint_options(&self) -> EndpointOptions {
        EndpointOptions {
            path: self.server.endpoint.clone(),
            max_body_size: self.server.max_body_size,
            protocols: self.protocols.enabled(),
        }
    }
}

const fn invalid(message: String) -> ConfigError {
    ConfigError::ValidationError { message }
}

/// HTTP endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to listen on.
    /// Default: "127.0.0.1:8080"
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Request path.
    /// Default: "/rpc"
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Largest accepted request body in bytes.
    /// Default: 1 MiB
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            endpoint: default_endpoint(),
            max_body_size: default_max_body_size(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_endpoint() -> String {
    DEFAULT_PATH.to_string()
}

const fn default_max_body_size() -> usize {
    DEFAULT_MAX_BODY_SIZE
}

const fn default_true() -> bool {
    true
}

/// Protocol enable flags.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtocolsConfig {
    /// Accept JSON-RPC 2.0 requests.
    #[serde(default = "default_true")]
    pub json_rpc: bool,

    /// Accept XML-RPC requests.
    #[serde(default = "default_true")]
    pub xml_rpc: bool,
}

impl ProtocolsConfig {
    /// Returns the enabled protocols as a set.
    #[must_use]
    pub const fn enabled(&self) -> ProtocolSet {
        let mut set = ProtocolSet::NONE;
        if self.json_rpc {
            set = set.with(Protocol::JsonRpc);
        }
        if self.xml_rpc {
            set = set.with(Protocol::XmlRpc);
        }
        set
    }
}

impl Default for ProtocolsConfig {
    fn default() -> Self {
        Self {
            json_rpc: true,
            xml_rpc: true,
        }
    }
}

/// Introspection configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntrospectionConfig {
    /// Register the `system.*` procedures.
    #[serde(default = "default_true")]
    pub system_methods: bool,
}

impl Default for IntrospectionConfig {
    fn default() -> Self {
        Self {
            system_methods: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

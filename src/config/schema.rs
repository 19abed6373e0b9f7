//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Backend ports and gateway-protocol environment values.
    pub backends: BackendConfig,

    /// Signed-token authentication.
    pub auth: AuthConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:80").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:80".to_string(),
        }
    }
}

impl ListenerConfig {
    /// Replace the port of the bind address, keeping the host part.
    pub fn set_port(&mut self, port: u16) {
        let host = match self.bind_address.rsplit_once(':') {
            Some((host, _)) => host.to_string(),
            None => self.bind_address.clone(),
        };
        self.bind_address = format!("{}:{}", host, port);
    }
}

/// Candidate backend ports and the fixed values sent to gateway-protocol
/// backends.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Port of the FastCGI backend. Probed first.
    pub gateway_port: u16,

    /// Port of the plain HTTP backend. Probed second, and the only target
    /// of WebSocket tunnels.
    pub http_port: u16,

    /// Upper bound for every backend dial, in milliseconds.
    pub connect_timeout_ms: u64,

    /// Value of `SERVER_ADDR` in the FastCGI environment.
    pub server_addr: String,

    /// Prefix joined with the request path to form `SCRIPT_FILENAME`.
    pub document_root: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            gateway_port: 9000,
            http_port: 80,
            connect_timeout_ms: 2000,
            server_addr: "127.0.0.1".to_string(),
            document_root: String::new(),
        }
    }
}

impl BackendConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Signed-token authentication. Active only when both fields are set.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Cookie carrying the token.
    pub cookie_name: String,

    /// PEM file with the RSA public key used to verify tokens.
    pub public_key_path: String,
}

impl AuthConfig {
    pub fn is_enabled(&self) -> bool {
        !self.cookie_name.is_empty() && !self.public_key_path.is_empty()
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for producing the response head, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 60 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

//! Error types shared across the gateway subsystems.
//!
//! None of these reach the client directly: every forwarding path turns
//! them into a well-formed HTTP response (see `http::response`).

use thiserror::Error;

/// The dispatcher could not find any candidate port accepting connections.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("no backend found for service `{service}`")]
    NoBackend { service: String },
}

/// Failures talking to a gateway-protocol (FastCGI) backend.
#[derive(Debug, Error)]
pub enum FastCgiError {
    #[error("failed to connect to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write request: {0}")]
    Write(#[source] std::io::Error),

    #[error("failed to read response: {0}")]
    Read(#[source] std::io::Error),

    #[error("malformed record: {0}")]
    Protocol(String),

    #[error("response header block exceeds {limit} bytes")]
    HeaderTooLarge { limit: usize },
}

impl FastCgiError {
    /// Short operator-facing message used as the 502 body.
    pub fn public_message(&self) -> &'static str {
        match self {
            FastCgiError::Connect { .. } => "Error contacting gateway backend.",
            FastCgiError::Write(_) => "Error sending request to gateway backend.",
            FastCgiError::Read(_) | FastCgiError::Protocol(_) | FastCgiError::HeaderTooLarge { .. } => {
                "Error reading response from gateway backend."
            }
        }
    }
}

/// Failures setting up a WebSocket tunnel.
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("failed to dial {target}: {source}")]
    Dial {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connection does not support upgrades")]
    UpgradeUnsupported,

    #[error("handshake failed: {0}")]
    Handshake(String),
}

/// Failures in signed-token handling. All of them degrade to
/// unauthenticated forwarding.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to read public key {path}: {source}")]
    KeyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid public key: {0}")]
    Key(#[source] jsonwebtoken::errors::Error),

    #[error("token rejected: {0}")]
    Token(#[source] jsonwebtoken::errors::Error),

    #[error("could not encode claims: {0}")]
    Claims(#[source] serde_json::Error),

    #[error("encoded claims are not a valid header value")]
    HeaderValue(#[from] axum::http::header::InvalidHeaderValue),
}

/// Renders an error and all of its sources on one line.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_includes_sources() {
        let err = FastCgiError::Write(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "pipe closed",
        ));
        let rendered = error_chain(&err);
        assert!(rendered.contains("failed to write request"));
        assert!(rendered.contains("pipe closed"));
    }

    #[test]
    fn public_messages_are_stable() {
        let err = FastCgiError::HeaderTooLarge { limit: 10 };
        assert_eq!(err.public_message(), "Error reading response from gateway backend.");
    }
}

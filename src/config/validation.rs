//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Leave authentication alone: a missing cookie name or key path
//!   simply disables it
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),

    #[error("observability.metrics_address `{0}` is not a socket address")]
    MetricsAddress(String),

    #[error("backends.{0} must be non-zero")]
    ZeroPort(&'static str),

    #[error("backends.gateway_port and backends.http_port must differ (both {0})")]
    SamePorts(u16),

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    let backends = &config.backends;
    if backends.gateway_port == 0 {
        errors.push(ValidationError::ZeroPort("gateway_port"));
    }
    if backends.http_port == 0 {
        errors.push(ValidationError::ZeroPort("http_port"));
    }
    if backends.gateway_port != 0 && backends.gateway_port == backends.http_port {
        errors.push(ValidationError::SamePorts(backends.gateway_port));
    }
    if backends.connect_timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("backends.connect_timeout_ms"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("timeouts.request_secs"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.backends.gateway_port = 80;
        config.backends.connect_timeout_ms = 0;
        config.auth.cookie_name = "session".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::BindAddress("not-an-address".into()),
                ValidationError::SamePorts(80),
                ValidationError::ZeroTimeout("backends.connect_timeout_ms"),
            ]
        );
    }

    #[test]
    fn half_configured_auth_is_valid_but_disabled() {
        let mut config = GatewayConfig::default();
        config.auth.public_key_path = "/etc/key.pem".into();
        assert!(validate_config(&config).is_ok());
        assert!(!config.auth.is_enabled());

        config.auth.public_key_path.clear();
        config.auth.cookie_name = "session".into();
        assert!(validate_config(&config).is_ok());
        assert!(!config.auth.is_enabled());
    }

    #[test]
    fn metrics_address_checked_only_when_enabled() {
        let mut config = GatewayConfig::default();
        config.observability.metrics_address = "nope".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::MetricsAddress("nope".into())]
        );
    }
}

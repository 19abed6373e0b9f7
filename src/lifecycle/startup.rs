//! Startup orchestration.
//!
//! # Design Decisions
//! - Fail fast: an unreadable key or an unbindable address is fatal
//! - The listener binds last, so traffic only arrives once everything is ready

use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::auth::ClaimsInjector;
use crate::config::GatewayConfig;
use crate::error::AuthError;
use crate::http::GatewayServer;
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("authentication setup failed: {0}")]
    Auth(#[from] AuthError),

    #[error("invalid metrics address `{0}`")]
    MetricsAddress(String),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] io::Error),
}

/// Bring the gateway up and serve until `shutdown` fires.
pub async fn start(
    config: GatewayConfig,
    shutdown: broadcast::Receiver<()>,
) -> Result<(), StartupError> {
    let claims = ClaimsInjector::from_config(&config.auth)?;

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr);
    }

    let address = config.listener.bind_address.clone();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })?;

    GatewayServer::new(config, claims)
        .run(listener, shutdown)
        .await
        .map_err(StartupError::Serve)
}

//! tenant-gateway
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                   TENANT GATEWAY                     │
//!                     │                                                      │
//!   Client Request    │  ┌─────────┐   ┌────────────┐   ┌────────────────┐   │
//!   ──────────────────┼─▶│  http   │──▶│    auth    │──▶│ routing::host  │   │
//!                     │  │ server  │   │  (claims)  │   │ service label  │   │
//!                     │  └─────────┘   └────────────┘   └───────┬────────┘   │
//!                     │                                         │            │
//!                     │                 ┌───────────────────────┤            │
//!                     │                 ▼                       ▼            │
//!                     │         ┌──────────────┐       ┌────────────────┐    │
//!                     │         │  websocket   │       │   Dispatcher   │    │
//!                     │         │   tunnel     │       │ probe + cache  │    │
//!                     │         └──────┬───────┘       └───┬────────┬───┘    │
//!                     │                │                   │        │        │
//!                     │                │           ┌───────▼──┐  ┌──▼─────┐  │
//!                     │                │           │ fastcgi  │  │ proxy  │  │
//!                     │                │           │  client  │  │FailSafe│  │
//!                     │                │           └────┬─────┘  └──┬─────┘  │
//!                     └────────────────┼────────────────┼───────────┼────────┘
//!                                      ▼                ▼           ▼
//!                                <service>:80    <service>:9000  <service>:80
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use tenant_gateway::config::{self, GatewayConfig};
use tenant_gateway::lifecycle::{signals, startup, Shutdown};
use tenant_gateway::observability::logging;

#[derive(Debug, Parser)]
#[command(name = "tenant-gateway")]
#[command(about = "Routes requests by host name to per-service FastCGI or HTTP backends", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on.
    #[arg(long)]
    port: Option<u16>,

    /// Cookie carrying the signed token.
    #[arg(long)]
    cookie_name: Option<String>,

    /// PEM file with the RSA public key that verifies tokens.
    #[arg(long)]
    pubkeyfile: Option<String>,

    /// Port of the FastCGI backends.
    #[arg(long)]
    gateway_port: Option<u16>,
}

impl Cli {
    fn apply(self, config: &mut GatewayConfig) {
        if let Some(port) = self.port {
            config.listener.set_port(port);
        }
        if let Some(cookie_name) = self.cookie_name {
            config.auth.cookie_name = cookie_name;
        }
        if let Some(path) = self.pubkeyfile {
            config.auth.public_key_path = path;
        }
        if let Some(port) = self.gateway_port {
            config.backends.gateway_port = port;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let mut cli = Cli::parse();

    let mut config = match cli.config.take() {
        Some(path) => match config::load_config(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("tenant-gateway: {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => GatewayConfig::default(),
    };
    cli.apply(&mut config);

    if let Err(errors) = config::validation::validate_config(&config) {
        for e in errors {
            eprintln!("tenant-gateway: {}", e);
        }
        return ExitCode::FAILURE;
    }

    logging::init_logging(&config.observability);

    if !config.auth.is_enabled()
        && !(config.auth.cookie_name.is_empty() && config.auth.public_key_path.is_empty())
    {
        tracing::warn!("Auth needs both a cookie name and a public key; running without it");
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        gateway_port = config.backends.gateway_port,
        http_port = config.backends.http_port,
        auth = config.auth.is_enabled(),
        "tenant-gateway starting"
    );

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    signals::spawn_signal_handler(shutdown);

    match startup::start(config, shutdown_rx).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Gateway failed");
            ExitCode::FAILURE
        }
    }
}

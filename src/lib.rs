//! Multi-tenant HTTP gateway.
//!
//! Requests are routed by the left-most label of their host name to a
//! per-service backend that speaks either FastCGI or plain HTTP. WebSocket
//! upgrades are tunnelled, and signed cookie tokens can be verified and
//! forwarded as trusted claims.

pub mod auth;
pub mod config;
pub mod error;
pub mod fastcgi;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod resilience;
pub mod routing;

pub use config::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;

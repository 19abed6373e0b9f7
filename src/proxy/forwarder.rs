//! The backend forwarding capability selected by the dispatcher.

use async_trait::async_trait;
use axum::{body::Body, http::Request, response::Response};

/// Sends one request to a tenant backend and produces the client response.
///
/// Implementations never fail: backend errors become well-formed error
/// responses before they reach the HTTP layer.
#[async_trait]
pub trait BackendForwarder: Send + Sync + std::fmt::Debug {
    /// Short protocol label used in logs and metrics.
    fn protocol(&self) -> &'static str;

    /// Forward `request` to the backend of `service`.
    async fn forward(&self, service: &str, request: Request<Body>) -> Response;
}

//! Axum middleware attaching verified claims to every request.

use std::sync::Arc;

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};

use crate::auth::ClaimsInjector;

/// Runs [`ClaimsInjector::inject`] before the request reaches the gateway
/// handler. Never rejects a request.
pub async fn inject_claims(
    State(injector): State<Arc<ClaimsInjector>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if injector.inject(request.headers_mut()) {
        tracing::debug!(cookie = %injector.cookie_name(), "Attached verified claims");
    }
    next.run(request).await
}

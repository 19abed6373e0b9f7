//! Fail-safe transport for plain HTTP forwarding.
//!
//! Wraps any request-sending [`Service`] so that transport failures
//! (connection refused, timeouts, DNS errors) turn into a synthetic
//! `502 Bad Gateway` instead of an error. Successful responses pass through
//! untouched.

use std::convert::Infallible;
use std::task::{Context, Poll};

use axum::{
    body::{Body, HttpBody},
    http::{Request, Response},
};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use tower::{BoxError, Service, ServiceExt};

use crate::error::error_chain;
use crate::http::response::bad_gateway;

/// A [`Service`] wrapper whose error type is [`Infallible`].
#[derive(Debug, Clone)]
pub struct FailSafe<S> {
    inner: S,
}

impl<S> FailSafe<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<S, B> Service<Request<Body>> for FailSafe<S>
where
    S: Service<Request<Body>, Response = Response<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<BoxError>,
    B: HttpBody<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response<Body>, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Readiness of the inner service is driven per call by `oneshot`, so
        // its readiness errors are converted like any other failure.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let inner = self.inner.clone();
        let url = request.uri().to_string();

        Box::pin(async move {
            match inner.oneshot(request).await {
                Ok(response) => Ok(response.map(Body::new)),
                Err(e) => {
                    let e: BoxError = e.into();
                    let cause = error_chain(&*e);
                    tracing::warn!(url = %url, error = %cause, "Backend request failed");
                    Ok(bad_gateway(&failure_message(&url, &cause)))
                }
            }
        })
    }
}

/// Diagnostic text naming the failed URL and the underlying cause.
pub fn failure_message(url: &str, cause: &str) -> String {
    format!("Proxy error when accessing {}\n{}", url, cause)
}

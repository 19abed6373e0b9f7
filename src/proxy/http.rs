//! Plain HTTP reverse-proxy forwarding.

use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{uri::Scheme, Request, Uri, Version},
    response::Response,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tower::ServiceExt;

use crate::http::request::{append_forwarded_for, peer_addr, strip_hop_by_hop};
use crate::http::response::bad_gateway;
use crate::proxy::failsafe::{failure_message, FailSafe};
use crate::proxy::BackendForwarder;

/// Pooled HTTP/1.1 client used for backend requests.
pub type HttpClient = Client<HttpConnector, Body>;

/// Forwards requests to `http://<service>:<port>` through a [`FailSafe`]
/// transport.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    port: u16,
    transport: FailSafe<HttpClient>,
}

impl HttpForwarder {
    pub fn new(port: u16, connect_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            port,
            transport: FailSafe::new(client),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

/// Rewrite `original` to target the service's HTTP backend. The port is
/// omitted when it is the scheme default.
pub fn backend_uri(service: &str, port: u16, original: &Uri) -> Result<Uri, axum::http::Error> {
    let authority = if port == 80 {
        service.to_string()
    } else {
        format!("{}:{}", service, port)
    };
    let path_and_query = original
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    Uri::builder()
        .scheme(Scheme::HTTP)
        .authority(authority)
        .path_and_query(path_and_query)
        .build()
}

#[async_trait]
impl BackendForwarder for HttpForwarder {
    fn protocol(&self) -> &'static str {
        "http"
    }

    async fn forward(&self, service: &str, request: Request<Body>) -> Response {
        let peer = peer_addr(&request);
        let (mut parts, body) = request.into_parts();

        parts.uri = match backend_uri(service, self.port, &parts.uri) {
            Ok(uri) => uri,
            Err(e) => {
                let target = format!("http://{}:{}", service, self.port);
                tracing::warn!(service = %service, error = %e, "Invalid backend address");
                return bad_gateway(&failure_message(&target, &e.to_string()));
            }
        };
        parts.version = Version::HTTP_11;
        strip_hop_by_hop(&mut parts.headers);
        if let Some(peer) = peer {
            append_forwarded_for(&mut parts.headers, peer);
        }

        tracing::debug!(service = %service, uri = %parts.uri, "Forwarding to HTTP backend");

        let mut response = self
            .transport
            .clone()
            .oneshot(Request::from_parts(parts, body))
            .await
            .unwrap_or_else(|never| match never {});

        strip_hop_by_hop(response.headers_mut());
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_port_is_omitted() {
        let original: Uri = "/index.html?lang=en".parse().unwrap();
        let uri = backend_uri("blog", 80, &original).unwrap();
        assert_eq!(uri.to_string(), "http://blog/index.html?lang=en");
    }

    #[test]
    fn other_ports_are_explicit() {
        let original: Uri = "http://blog.example.com:8443/feed".parse().unwrap();
        let uri = backend_uri("blog", 8080, &original).unwrap();
        assert_eq!(uri.to_string(), "http://blog:8080/feed");
    }

    #[test]
    fn missing_path_becomes_root() {
        let original: Uri = "http://blog.example.com".parse().unwrap();
        let uri = backend_uri("blog", 80, &original).unwrap();
        assert_eq!(uri.path(), "/");
    }

    #[test]
    fn unusable_service_is_an_error() {
        let original: Uri = "/".parse().unwrap();
        assert!(backend_uri("bad host", 80, &original).is_err());
    }
}

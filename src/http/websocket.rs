//! WebSocket tunnelling.
//!
//! # Responsibilities
//! - Detect WebSocket upgrade requests
//! - Replay the upgrade handshake to the service's HTTP port
//! - Relay raw bytes between the upgraded client and backend connections
//!
//! # Data Flow
//! ```text
//! Client ←──── raw bytes ────→ Gateway ←──── raw bytes ────→ Backend
//! ```
//!
//! # Design Decisions
//! - Frames are never inspected; after the handshake this is a byte pipe
//! - The tunnel ends as soon as either direction finishes
//! - Setup failures answer 500, not the gateway 502
//! - The handshake is re-serialized by hyper's HTTP/1 client, so header
//!   names reach the backend lowercased; values and order are kept

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, uri::PathAndQuery, HeaderMap, Request, StatusCode, Uri},
    response::Response,
};
use hyper::upgrade::{OnUpgrade, Upgraded};
use hyper_util::rt::TokioIo;
use tokio::io::AsyncWriteExt;

use crate::error::{error_chain, TunnelError};
use crate::http::request::{append_forwarded_for, peer_addr, strip_hop_by_hop};
use crate::http::response::text_error;
use crate::observability::metrics;
use crate::resilience::timeouts;

/// Body of every tunnel setup failure.
pub const TUNNEL_ERROR_MESSAGE: &str = "Error contacting backend server.";

fn first_value_is(headers: &HeaderMap, name: header::HeaderName, expected: &str) -> bool {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().eq_ignore_ascii_case(expected))
        .unwrap_or(false)
}

/// `Connection: upgrade` together with `Upgrade: websocket`.
pub fn is_websocket(headers: &HeaderMap) -> bool {
    first_value_is(headers, header::CONNECTION, "upgrade")
        && first_value_is(headers, header::UPGRADE, "websocket")
}

/// Tunnels WebSocket upgrades to `<service>:<port>`.
#[derive(Debug, Clone)]
pub struct WebSocketTunnel {
    port: u16,
    connect_timeout: Duration,
}

impl WebSocketTunnel {
    pub fn new(port: u16, connect_timeout: Duration) -> Self {
        Self {
            port,
            connect_timeout,
        }
    }

    pub async fn handle(&self, service: &str, request: Request<Body>) -> Response {
        match self.open(service, request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(service = %service, port = self.port, error = %error_chain(&e), "WebSocket tunnel setup failed");
                metrics::record_tunnel("setup_failed");
                text_error(StatusCode::INTERNAL_SERVER_ERROR, TUNNEL_ERROR_MESSAGE)
            }
        }
    }

    async fn open(&self, service: &str, mut request: Request<Body>) -> Result<Response, TunnelError> {
        let client_upgrade = request
            .extensions_mut()
            .remove::<OnUpgrade>()
            .ok_or(TunnelError::UpgradeUnsupported)?;

        let target = format!("{}:{}", service, self.port);
        let stream = timeouts::connect(target.as_str(), self.connect_timeout)
            .await
            .map_err(|source| TunnelError::Dial { target, source })?;

        if let Some(peer) = peer_addr(&request) {
            append_forwarded_for(request.headers_mut(), peer);
        }
        let path = request
            .uri()
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));
        *request.uri_mut() = Uri::from(path);

        let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| TunnelError::Handshake(e.to_string()))?;
        let conn_service = service.to_string();
        tokio::spawn(async move {
            if let Err(e) = connection.with_upgrades().await {
                tracing::debug!(service = %conn_service, error = %e, "Backend handshake connection closed");
            }
        });

        let mut reply = sender
            .send_request(request)
            .await
            .map_err(|e| TunnelError::Handshake(e.to_string()))?;

        if reply.status() != StatusCode::SWITCHING_PROTOCOLS {
            tracing::debug!(service = %service, status = %reply.status(), "Backend declined the upgrade");
            metrics::record_tunnel("declined");
            let (mut parts, body) = reply.into_parts();
            strip_hop_by_hop(&mut parts.headers);
            return Ok(Response::from_parts(parts, Body::new(body)));
        }

        let backend_upgrade = hyper::upgrade::on(&mut reply);
        let (parts, _) = reply.into_parts();

        let service = service.to_string();
        tokio::spawn(async move {
            match tokio::try_join!(client_upgrade, backend_upgrade) {
                Ok((client, backend)) => relay(&service, client, backend).await,
                Err(e) => {
                    tracing::warn!(service = %service, error = %e, "WebSocket upgrade failed");
                    metrics::record_tunnel("upgrade_failed");
                }
            }
        });

        metrics::record_tunnel("opened");
        Ok(Response::from_parts(parts, Body::empty()))
    }
}

/// Copy bytes both ways until either side finishes, then close both.
async fn relay(service: &str, client: Upgraded, backend: Upgraded) {
    let (mut client_read, mut client_write) = tokio::io::split(TokioIo::new(client));
    let (mut backend_read, mut backend_write) = tokio::io::split(TokioIo::new(backend));

    let (direction, result) = tokio::select! {
        r = tokio::io::copy(&mut client_read, &mut backend_write) => ("client_to_backend", r),
        r = tokio::io::copy(&mut backend_read, &mut client_write) => ("backend_to_client", r),
    };

    match result {
        Ok(bytes) => tracing::debug!(service = %service, direction, bytes, "WebSocket tunnel closed"),
        Err(e) => tracing::debug!(service = %service, direction, error = %e, "WebSocket tunnel interrupted"),
    }

    let _ = client_write.shutdown().await;
    let _ = backend_write.shutdown().await;
    metrics::record_tunnel("closed");
}

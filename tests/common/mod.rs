//! Shared utilities for integration testing.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{body::Bytes, extract::Request, http::HeaderMap, routing::any, Json, Router};
use bytes::BytesMut;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

use tenant_gateway::auth::ClaimsInjector;
use tenant_gateway::config::GatewayConfig;
use tenant_gateway::fastcgi::record::{
    decode_name_values, encode_record, encode_stream, RecordReader, RecordType,
};
use tenant_gateway::{GatewayServer, Shutdown};

/// Host every test addresses; its service identifier is `localhost`.
pub const TENANT_HOST: &str = "localhost.tenant.test";

/// A port nothing listens on.
pub async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Gateway config pointing at the given backend ports.
pub fn gateway_config(gateway_port: u16, http_port: u16) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.backends.gateway_port = gateway_port;
    config.backends.http_port = http_port;
    config.backends.connect_timeout_ms = 500;
    config.backends.server_addr = "10.0.0.1".into();
    config.backends.document_root = "/srv/www".into();
    config
}

/// A running gateway. Dropping it leaves the server running until the test
/// runtime stops; call `stop` to drain explicitly.
pub struct Gateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl Gateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn stop(&self) {
        self.shutdown.trigger();
    }
}

pub async fn start_gateway(config: GatewayConfig, claims: Option<ClaimsInjector>) -> Gateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    let server = GatewayServer::new(config, claims);
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    Gateway { addr, shutdown }
}

/// HTTP client that never follows redirects and ignores proxy env vars.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

fn headers_json(headers: &HeaderMap) -> Value {
    let mut map = serde_json::Map::new();
    for name in headers.keys() {
        let values: Vec<&str> = headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        map.insert(name.as_str().to_string(), json!(values.join(", ")));
    }
    Value::Object(map)
}

/// Plain HTTP backend that describes every request it receives as JSON.
pub async fn start_http_backend() -> SocketAddr {
    async fn echo(request: Request) -> Json<Value> {
        let (parts, body) = request.into_parts();
        let body: Bytes = axum::body::to_bytes(body, 1024 * 1024).await.unwrap_or_default();
        Json(json!({
            "method": parts.method.as_str(),
            "uri": parts.uri.to_string(),
            "headers": headers_json(&parts.headers),
            "body": String::from_utf8_lossy(&body),
        }))
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new()
        .route("/", any(echo))
        .route("/{*path}", any(echo));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// What the mock FastCGI responder received.
#[derive(Debug, Clone, Default)]
pub struct FastCgiRequest {
    pub params: HashMap<String, String>,
    pub stdin: Vec<u8>,
}

/// FastCGI responder. `respond` returns the raw CGI output (header block,
/// blank line, body) written to STDOUT.
pub async fn start_fastcgi_backend<F>(respond: F) -> SocketAddr
where
    F: Fn(&FastCgiRequest) -> Vec<u8> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let respond = Arc::new(respond);

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let respond = Arc::clone(&respond);
            tokio::spawn(async move {
                let (read_half, mut write_half) = socket.into_split();
                let mut reader = RecordReader::new(read_half);
                let mut request = FastCgiRequest::default();
                let mut params = Vec::new();

                while let Ok(Some(record)) = reader.next().await {
                    match record.kind() {
                        Some(RecordType::Params) => params.extend_from_slice(&record.content),
                        Some(RecordType::Stdin) if record.content.is_empty() => break,
                        Some(RecordType::Stdin) => request.stdin.extend_from_slice(&record.content),
                        _ => {}
                    }
                }
                // Probe connections close without sending anything.
                if params.is_empty() {
                    return;
                }
                for (name, value) in decode_name_values(&params).unwrap() {
                    request.params.insert(
                        String::from_utf8(name).unwrap(),
                        String::from_utf8(value).unwrap(),
                    );
                }

                let output = respond(&request);
                let mut buf = BytesMut::new();
                encode_record(&mut buf, RecordType::Stderr, b"mock backend notice");
                encode_stream(&mut buf, RecordType::Stdout, &output);
                encode_record(&mut buf, RecordType::Stdout, &[]);
                encode_record(&mut buf, RecordType::EndRequest, &[0, 0, 0, 0, 0, 0, 0, 0]);
                let _ = write_half.write_all(&buf).await;
                let _ = write_half.shutdown().await;
            });
        }
    });
    addr
}

/// WebSocket backend that echoes text and binary messages.
pub async fn start_websocket_echo() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(socket).await else {
                    return;
                };
                while let Some(Ok(message)) = ws.next().await {
                    if message.is_text() || message.is_binary() {
                        if ws.send(message).await.is_err() {
                            break;
                        }
                    } else if message.is_close() {
                        break;
                    }
                }
            });
        }
    });
    addr
}

//! End-to-end tests for WebSocket tunnelling.

use axum::http::{HeaderValue, StatusCode};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio_tungstenite::tungstenite::{client::IntoClientRequest, Message};

mod common;
use common::{
    client, gateway_config, start_gateway, start_http_backend, start_websocket_echo, unused_port,
    TENANT_HOST,
};

#[tokio::test]
async fn frames_are_relayed_both_ways() {
    let backend = start_websocket_echo().await;
    let gateway = start_gateway(gateway_config(unused_port().await, backend.port()), None).await;

    let mut request = format!("ws://{}/chat", gateway.addr)
        .into_client_request()
        .unwrap();
    request
        .headers_mut()
        .insert("host", HeaderValue::from_static(TENANT_HOST));

    let (mut ws, response) = tokio_tungstenite::connect_async(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);

    ws.send(Message::text("hello")).await.unwrap();
    let echoed = ws.next().await.unwrap().unwrap();
    assert_eq!(echoed.into_text().unwrap().as_str(), "hello");

    ws.send(Message::binary(vec![1u8, 2, 3])).await.unwrap();
    let echoed = ws.next().await.unwrap().unwrap();
    assert_eq!(echoed.into_data().to_vec(), vec![1u8, 2, 3]);

    ws.close(None).await.unwrap();
}

#[tokio::test]
async fn unreachable_backend_is_internal_error() {
    let gateway = start_gateway(
        gateway_config(unused_port().await, unused_port().await),
        None,
    )
    .await;

    let res = client()
        .get(gateway.url("/chat"))
        .header("Host", TENANT_HOST)
        .header("Connection", "upgrade")
        .header("Upgrade", "websocket")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.text().await.unwrap(), "Error contacting backend server.\n");
}

#[tokio::test]
async fn declined_upgrade_is_returned_as_is() {
    let backend = start_http_backend().await;
    let gateway = start_gateway(gateway_config(unused_port().await, backend.port()), None).await;

    let res = client()
        .get(gateway.url("/chat"))
        .header("Host", TENANT_HOST)
        .header("Connection", "upgrade")
        .header("Upgrade", "websocket")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let seen: Value = res.json().await.unwrap();
    assert_eq!(seen["uri"], "/chat");
    assert_eq!(seen["headers"]["upgrade"], "websocket");
    assert_eq!(seen["headers"]["host"], TENANT_HOST);
}

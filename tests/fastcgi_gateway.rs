//! End-to-end tests for services whose backend speaks FastCGI.

use axum::http::StatusCode;
use serde_json::{json, Value};

mod common;
use common::{client, gateway_config, start_fastcgi_backend, start_gateway, unused_port, TENANT_HOST};

#[tokio::test]
async fn status_header_sets_response_code() {
    let backend = start_fastcgi_backend(|_| {
        b"Status: 404 Not Found\r\nContent-Type: text/plain\r\nX-Tenant: shop\r\n\r\nno such page".to_vec()
    })
    .await;
    let gateway = start_gateway(gateway_config(backend.port(), unused_port().await), None).await;

    let res = client()
        .get(gateway.url("/missing.php"))
        .header("Host", TENANT_HOST)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.headers()["content-type"], "text/plain");
    assert_eq!(res.headers()["x-tenant"], "shop");
    assert!(res.headers().get("status").is_none());
    assert_eq!(res.text().await.unwrap(), "no such page");
}

#[tokio::test]
async fn missing_status_defaults_to_ok() {
    let backend = start_fastcgi_backend(|_| b"Content-Type: text/html\n\n<h1>hi</h1>".to_vec()).await;
    let gateway = start_gateway(gateway_config(backend.port(), unused_port().await), None).await;

    let res = client()
        .get(gateway.url("/"))
        .header("Host", TENANT_HOST)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "<h1>hi</h1>");
}

#[tokio::test]
async fn location_redirects_without_body() {
    let backend =
        start_fastcgi_backend(|_| b"Location: /login\r\n\r\nthis body is dropped".to_vec()).await;
    let gateway = start_gateway(gateway_config(backend.port(), unused_port().await), None).await;

    let res = client()
        .post(gateway.url("/account"))
        .header("Host", TENANT_HOST)
        .body("x=1")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(res.headers()["location"], "/login");
    assert_eq!(res.text().await.unwrap(), "");
}

#[tokio::test]
async fn head_responses_omit_body() {
    let backend = start_fastcgi_backend(|_| b"Status: 200 OK\r\n\r\nbody".to_vec()).await;
    let gateway = start_gateway(gateway_config(backend.port(), unused_port().await), None).await;

    let res = client()
        .head(gateway.url("/"))
        .header("Host", TENANT_HOST)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn environment_and_body_reach_backend() {
    let backend = start_fastcgi_backend(|request| {
        let described = json!({
            "params": request.params,
            "stdin": String::from_utf8_lossy(&request.stdin),
        });
        format!("Content-Type: application/json\r\n\r\n{}", described).into_bytes()
    })
    .await;
    let gateway = start_gateway(gateway_config(backend.port(), unused_port().await), None).await;

    let res = client()
        .post(gateway.url("/app/index.php?page=2"))
        .header("Host", TENANT_HOST)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .header("X-Custom", "a")
        .body("name=value")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let seen: Value = res.json().await.unwrap();
    let params = &seen["params"];
    assert_eq!(params["REQUEST_METHOD"], "POST");
    assert_eq!(params["REQUEST_URI"], "/app/index.php?page=2");
    assert_eq!(params["SCRIPT_NAME"], "/app/index.php");
    assert_eq!(params["SCRIPT_FILENAME"], "/srv/www/app/index.php");
    assert_eq!(params["QUERY_STRING"], "page=2");
    assert_eq!(params["CONTENT_LENGTH"], "10");
    assert_eq!(params["CONTENT_TYPE"], "application/x-www-form-urlencoded");
    assert_eq!(params["HTTP_X_CUSTOM"], "a");
    assert_eq!(params["HTTP_HOST"], TENANT_HOST);
    assert_eq!(params["SERVER_ADDR"], "10.0.0.1");
    assert_eq!(params["REMOTE_ADDR"], "127.0.0.1");
    assert_eq!(params["SERVER_NAME"], TENANT_HOST);
    assert_eq!(seen["stdin"], "name=value");
}

#[tokio::test]
async fn large_bodies_cross_record_boundaries() {
    let backend = start_fastcgi_backend(|request| {
        let mut out = b"Content-Type: application/octet-stream\r\n\r\n".to_vec();
        out.extend_from_slice(&request.stdin);
        out
    })
    .await;
    let gateway = start_gateway(gateway_config(backend.port(), unused_port().await), None).await;

    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let res = client()
        .put(gateway.url("/upload"))
        .header("Host", TENANT_HOST)
        .body(payload.clone())
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.bytes().await.unwrap().to_vec(), payload);
}

#[tokio::test]
async fn fastcgi_port_wins_over_http() {
    let fastcgi = start_fastcgi_backend(|_| b"X-Backend: fastcgi\r\n\r\nfrom fastcgi".to_vec()).await;
    let http = common::start_http_backend().await;
    let gateway = start_gateway(gateway_config(fastcgi.port(), http.port()), None).await;

    for _ in 0..3 {
        let res = client()
            .get(gateway.url("/"))
            .header("Host", TENANT_HOST)
            .send()
            .await
            .unwrap();
        assert_eq!(res.headers()["x-backend"], "fastcgi");
        assert_eq!(res.text().await.unwrap(), "from fastcgi");
    }
}

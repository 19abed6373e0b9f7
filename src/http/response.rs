//! Response construction helpers.
//!
//! # Responsibilities
//! - Build the synthetic 502 returned whenever a backend cannot be used
//! - Build plain-text error responses for local failures
//! - Parse `Name: value` header blocks (CGI replies, backend handshakes)
//!
//! # Design Decisions
//! - Gateway error bodies are padded to at least 512 bytes; some browsers
//!   replace shorter error bodies with their own page
//! - Gateway error bodies are streamed, so no Content-Length is sent
//! - Error responses are built on demand and never cached

use std::convert::Infallible;

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use bytes::Bytes;
use futures_util::stream;

/// Minimum size of a gateway error body.
pub const MIN_ERROR_BODY_LEN: usize = 512;

/// Pad `message` with trailing spaces to [`MIN_ERROR_BODY_LEN`] bytes.
pub fn padded_error_body(message: &str) -> String {
    let mut body = message.to_string();
    if body.len() < MIN_ERROR_BODY_LEN {
        body.push_str(&" ".repeat(MIN_ERROR_BODY_LEN - body.len()));
    }
    body
}

/// A 502 Bad Gateway carrying `message`, padded and of unknown length.
pub fn bad_gateway(message: &str) -> Response {
    let chunk = Bytes::from(padded_error_body(message));
    let body = Body::from_stream(stream::once(async move { Ok::<_, Infallible>(chunk) }));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::BAD_GATEWAY;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// A plain-text error response.
pub fn text_error(status: StatusCode, message: &str) -> Response {
    let mut response = Response::new(Body::from(format!("{}\n", message)));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    response
}

/// Split a header block into `(name, value)` pairs, in order.
///
/// Lines may end in `\r\n` or `\n`. Lines without a colon or with an empty
/// name are skipped. Values are trimmed of surrounding whitespace.
pub fn parse_header_lines(block: &str) -> Vec<(String, String)> {
    block
        .lines()
        .filter_map(|line| {
            let line = line.trim_end_matches('\r');
            let (name, value) = line.split_once(':')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Position just past the blank line ending a header block, if present.
/// A blank line at the very start ends an empty block.
pub fn find_head_end(buf: &[u8]) -> Option<usize> {
    if buf.starts_with(b"\n") {
        return Some(1);
    }
    if buf.starts_with(b"\r\n") {
        return Some(2);
    }
    let mut i = 0;
    while i < buf.len() {
        if buf[i] == b'\n' {
            if buf.get(i + 1) == Some(&b'\n') {
                return Some(i + 2);
            }
            if buf.get(i + 1) == Some(&b'\r') && buf.get(i + 2) == Some(&b'\n') {
                return Some(i + 3);
            }
        }
        i += 1;
    }
    None
}

//! Translation of a CGI reply into an HTTP response.
//!
//! # Design Decisions
//! - The `Status` header is consumed, never copied to the client
//! - An unparseable or sub-100 status defaults to 200
//! - A `Location` header turns the reply into a body-less redirect
//! - HEAD responses never carry a body

use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    response::Response,
};

use crate::http::response::parse_header_lines;

/// Parsed header block of a CGI reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CgiHead {
    pub status: StatusCode,
    /// Whether the reply carried a `Status` header at all.
    pub status_present: bool,
    /// Remaining headers in reply order, `Status` removed.
    pub headers: Vec<(String, String)>,
}

impl CgiHead {
    pub fn location(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("location"))
            .map(|(_, value)| value.as_str())
    }
}

/// Status code from a `Status` header value such as `404 Not Found`.
pub fn parse_status(value: Option<&str>) -> StatusCode {
    let digits: String = value
        .unwrap_or("")
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();

    digits
        .parse::<u16>()
        .ok()
        .filter(|code| *code >= 100)
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::OK)
}

/// Parse the header block of a CGI reply.
pub fn parse_head(block: &str) -> CgiHead {
    let mut status_value = None;
    let mut headers = Vec::new();

    for (name, value) in parse_header_lines(block) {
        if name.eq_ignore_ascii_case("status") {
            status_value.get_or_insert(value);
        } else {
            headers.push((name, value));
        }
    }

    CgiHead {
        status: parse_status(status_value.as_deref()),
        status_present: status_value.is_some(),
        headers,
    }
}

/// Assemble the client response from a parsed head and the remaining body.
pub fn build_response(head: CgiHead, method: &Method, body: Body) -> Response {
    let mut response = Response::new(Body::empty());
    let headers = response.headers_mut();

    for (name, value) in &head.headers {
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) else {
            tracing::debug!(header = %name, "Dropping invalid backend header");
            continue;
        };
        if headers.contains_key(&name) {
            headers.append(name, value);
        } else {
            headers.insert(name, value);
        }
    }

    if head.location().is_some() {
        headers.remove(header::CONTENT_LENGTH);
        *response.status_mut() = if head.status_present {
            head.status
        } else {
            StatusCode::FOUND
        };
        return response;
    }

    *response.status_mut() = head.status;
    if method != Method::HEAD {
        *response.body_mut() = body;
    }
    response
}

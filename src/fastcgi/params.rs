//! CGI environment construction for gateway-protocol requests.

use axum::http::{header, request::Parts, HeaderMap};
use bytes::BytesMut;

use crate::fastcgi::record::encode_name_value;
use crate::http::request::peer_addr_from_parts;

/// Prefix applied to every exported request header.
pub const HEADER_PREFIX: &str = "HTTP_";

/// `SERVER_SOFTWARE` value.
pub const SERVER_SOFTWARE: &str = concat!("tenant-gateway/", env!("CARGO_PKG_VERSION"));

/// Static values every environment carries.
#[derive(Debug, Clone, Default)]
pub struct EnvSettings {
    /// Value of `SERVER_ADDR`.
    pub server_addr: String,
    /// Prefix for `SCRIPT_FILENAME`; exported as `DOCUMENT_ROOT`.
    pub document_root: String,
}

/// Ordered CGI environment for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CgiEnv(Vec<(String, String)>);

impl CgiEnv {
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encode as the PARAMS name-value stream.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        for (name, value) in self.iter() {
            encode_name_value(&mut buf, name.as_bytes(), value.as_bytes());
        }
        buf
    }
}

/// `User-Agent` → `HTTP_USER_AGENT`.
pub fn header_param_name(name: &str) -> String {
    let mut out = String::with_capacity(HEADER_PREFIX.len() + name.len());
    out.push_str(HEADER_PREFIX);
    out.extend(name.chars().map(|c| match c {
        '-' => '_',
        c => c.to_ascii_uppercase(),
    }));
    out
}

fn header_str<'a>(headers: &'a HeaderMap, name: header::HeaderName) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// Build the environment for `parts`.
pub fn build_env(parts: &Parts, settings: &EnvSettings) -> CgiEnv {
    let mut env = CgiEnv::default();
    let path = parts.uri.path();
    let query = parts.uri.query().unwrap_or("");
    let request_uri = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or(path);

    let host = parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| parts.uri.authority().map(|a| a.as_str()))
        .unwrap_or("");
    let (server_name, server_port) = split_host_port(host);

    let document_root = settings.document_root.trim_end_matches('/');

    env.set("GATEWAY_INTERFACE", "CGI/1.1");
    env.set("SERVER_SOFTWARE", SERVER_SOFTWARE);
    env.set("SERVER_PROTOCOL", format!("{:?}", parts.version));
    env.set("SERVER_NAME", server_name);
    env.set("SERVER_PORT", server_port);
    env.set("SERVER_ADDR", settings.server_addr.as_str());
    env.set("REQUEST_METHOD", parts.method.as_str());
    env.set("REQUEST_URI", request_uri);
    env.set("DOCUMENT_URI", path);
    env.set("SCRIPT_NAME", path);
    env.set("SCRIPT_FILENAME", format!("{}{}", document_root, path));
    env.set("DOCUMENT_ROOT", document_root);
    env.set("QUERY_STRING", query);
    env.set("CONTENT_LENGTH", header_str(&parts.headers, header::CONTENT_LENGTH));
    env.set("CONTENT_TYPE", header_str(&parts.headers, header::CONTENT_TYPE));

    if let Some(peer) = peer_addr_from_parts(parts) {
        env.set("REMOTE_ADDR", peer.ip().to_string());
        env.set("REMOTE_PORT", peer.port().to_string());
    }

    for name in parts.headers.keys() {
        // HTTP_PROXY would be read as a proxy setting by many backends.
        if name.as_str().eq_ignore_ascii_case("proxy") {
            continue;
        }
        let values: Vec<&str> = parts
            .headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        env.set(header_param_name(name.as_str()), values.join(";"));
    }

    env
}

/// Split `host[:port]`, defaulting the port to 80. Bracketed IPv6 literals
/// keep their brackets.
fn split_host_port(host: &str) -> (&str, &str) {
    if let Some(end) = host.rfind(']') {
        return match host[end + 1..].strip_prefix(':') {
            Some(port) => (&host[..=end], port),
            None => (host, "80"),
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) => (name, port),
        None => (host, "80"),
    }
}

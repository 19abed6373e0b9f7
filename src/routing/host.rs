//! Service identifier resolution.
//!
//! Every subsystem that needs to know which tenant a request belongs to goes
//! through [`resolve`] so that routing, tunnelling and forwarding always agree.

use axum::http::{header, Request};

/// Returns the left-most label of a host name: everything before the first
/// `.`, or the whole input when it has none.
pub fn resolve(host: &str) -> &str {
    match host.find('.') {
        Some(idx) => &host[..idx],
        None => host,
    }
}

/// Extracts the host the client addressed, preferring the `Host` header and
/// falling back to the request-target authority.
pub fn request_host<B>(req: &Request<B>) -> Option<&str> {
    req.headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| req.uri().authority().map(|a| a.as_str()))
        .filter(|h| !h.is_empty())
}

/// Service identifier for a request, if it names a host at all.
pub fn service_for<B>(req: &Request<B>) -> Option<String> {
    request_host(req)
        .map(resolve)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn takes_label_before_first_dot() {
        assert_eq!(resolve("blog.example.com"), "blog");
        assert_eq!(resolve("api.tenants.internal:8080"), "api");
        assert_eq!(resolve("svc."), "svc");
    }

    #[test]
    fn whole_string_without_dot() {
        assert_eq!(resolve("localhost"), "localhost");
        assert_eq!(resolve("localhost:8080"), "localhost:8080");
        assert_eq!(resolve(""), "");
    }

    #[test]
    fn resolve_is_idempotent() {
        for host in ["a.b.c", "plain", "x:1", ".leading", "a..b"] {
            let once = resolve(host);
            assert_eq!(resolve(once), once);
        }
    }

    #[test]
    fn service_from_host_header() {
        let req = Request::builder()
            .uri("/index.php")
            .header("Host", "shop.example.com")
            .body(Body::empty())
            .unwrap();
        assert_eq!(service_for(&req).as_deref(), Some("shop"));
    }

    #[test]
    fn service_from_absolute_uri() {
        let req = Request::builder()
            .uri("http://wiki.example.com/page")
            .body(Body::empty())
            .unwrap();
        assert_eq!(service_for(&req).as_deref(), Some("wiki"));
    }

    #[test]
    fn no_host_no_service() {
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        assert_eq!(service_for(&req), None);

        let req = Request::builder()
            .uri("/")
            .header("Host", ".example.com")
            .body(Body::empty())
            .unwrap();
        assert_eq!(service_for(&req), None);
    }
}

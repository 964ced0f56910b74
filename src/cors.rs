//! CORS configuration for the export endpoint
//!
//! CORS is off unless at least one origin is configured. Origins are given
//! with `--cors-origin` (repeatable) or `PAGEPRESS_CORS_ORIGINS`:
//!
//! - `*` allows any origin
//! - `localhost` allows `localhost` and `127.0.0.1` on any port, http or https
//! - anything else must match the `Origin` header exactly
//!
//! Only `POST` (and the `OPTIONS` preflight) with a `Content-Type` header is
//! allowed; the export endpoint accepts nothing else.

use http::{header::HeaderValue, Method};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

/// Headers a browser client may send
pub const ALLOWED_HEADERS: [http::header::HeaderName; 1] = [http::header::CONTENT_TYPE];

/// Methods a browser client may use
pub const ALLOWED_METHODS: [Method; 2] = [Method::POST, Method::OPTIONS];

/// Headers a browser client may read from the response
pub const EXPOSED_HEADERS: [http::header::HeaderName; 2] = [
    http::header::CONTENT_DISPOSITION,
    http::header::CONTENT_TYPE,
];

/// Preflight cache lifetime (1 hour)
pub const DEFAULT_MAX_AGE_SECS: u64 = 3600;

/// Keyword that expands to every loopback origin
pub const LOCALHOST_KEYWORD: &str = "localhost";

/// Build a CORS layer for `origins`, or `None` when CORS is disabled.
///
/// Origins that are not valid header values are skipped with a warning.
pub fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<&str> = origins
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .collect();

    if origins.is_empty() {
        return None;
    }

    let base = CorsLayer::new()
        .allow_methods(ALLOWED_METHODS)
        .allow_headers(ALLOWED_HEADERS)
        .expose_headers(EXPOSED_HEADERS)
        .max_age(Duration::from_secs(DEFAULT_MAX_AGE_SECS));

    if origins.contains(&"*") {
        return Some(base.allow_origin(Any));
    }

    let allow_localhost = origins.contains(&LOCALHOST_KEYWORD);
    let exact: Vec<HeaderValue> = origins
        .iter()
        .filter(|o| **o != LOCALHOST_KEYWORD)
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring CORS origin that is not a valid header value: {}", o);
                None
            }
        })
        .collect();

    Some(base.allow_origin(AllowOrigin::predicate(move |origin, _| {
        (allow_localhost && is_localhost_origin(origin)) || exact.iter().any(|o| o == origin)
    })))
}

/// Whether `origin` is `localhost` or `127.0.0.1`, any scheme or port.
pub fn is_localhost_origin(origin: &HeaderValue) -> bool {
    let Ok(origin) = origin.to_str() else {
        return false;
    };

    let Some(rest) = origin
        .strip_prefix("http://")
        .or_else(|| origin.strip_prefix("https://"))
    else {
        return false;
    };

    let host = rest.split('/').next().unwrap_or_default();
    let host = match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    };

    matches!(host, "localhost" | "127.0.0.1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use tower::ServiceExt;

    fn origin(s: &str) -> HeaderValue {
        HeaderValue::from_str(s).unwrap()
    }

    #[test]
    fn test_localhost_origins() {
        assert!(is_localhost_origin(&origin("http://localhost")));
        assert!(is_localhost_origin(&origin("https://localhost:8443")));
        assert!(is_localhost_origin(&origin("http://127.0.0.1:3000")));
        assert!(is_localhost_origin(&origin("http://localhost:3000/app")));
    }

    #[test]
    fn test_non_localhost_origins() {
        assert!(!is_localhost_origin(&origin("http://example.com")));
        assert!(!is_localhost_origin(&origin("http://localhost.evil.com")));
        assert!(!is_localhost_origin(&origin("http://192.168.1.10")));
        assert!(!is_localhost_origin(&origin("ftp://localhost")));
        assert!(!is_localhost_origin(&origin("localhost")));
    }

    #[test]
    fn test_disabled_without_origins() {
        assert!(cors_layer(&[]).is_none());
        assert!(cors_layer(&["  ".to_string()]).is_none());
    }

    async fn preflight(origins: &[&str], from: &str) -> Option<String> {
        let origins: Vec<String> = origins.iter().map(|s| s.to_string()).collect();
        let app = Router::new()
            .route("/", post(|| async { "ok" }))
            .layer(cors_layer(&origins).unwrap());

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/")
                    .header(header::ORIGIN, from)
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn test_wildcard_allows_any_origin() {
        assert_eq!(
            preflight(&["*"], "https://app.example.com").await.as_deref(),
            Some("*")
        );
    }

    #[tokio::test]
    async fn test_exact_origin_list() {
        let allowed = ["https://app.example.com"];
        assert_eq!(
            preflight(&allowed, "https://app.example.com").await.as_deref(),
            Some("https://app.example.com")
        );
        assert_eq!(preflight(&allowed, "https://other.example.com").await, None);
    }

    #[tokio::test]
    async fn test_localhost_keyword() {
        assert_eq!(
            preflight(&["localhost"], "http://localhost:5173").await.as_deref(),
            Some("http://localhost:5173")
        );
        assert_eq!(preflight(&["localhost"], "https://example.com").await, None);
    }
}

//! Request ID middleware for request tracing and correlation.
//!
//! Every request carries an ID in the `x-request-id` header: the one set by
//! an upstream proxy when it looks sane, a fresh UUID v4 otherwise. The ID is
//! recorded on the tracing span, tagged in Sentry and echoed in the response.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest upstream request ID accepted as is.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Use `candidate` as request ID if it is short and printable.
fn accept_upstream(candidate: &str) -> Option<String> {
    let valid = !candidate.is_empty()
        && candidate.len() <= MAX_REQUEST_ID_LEN
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'));
    valid.then(|| candidate.to_owned())
}

/// Middleware that ensures every request has a unique request ID.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(accept_upstream)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    Span::current().record("request_id", &request_id);

    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    // Downstream handlers see the same ID the response reports
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        request.headers_mut().insert(REQUEST_ID_HEADER, value.clone());
        let mut response = next.run(request).await;
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
        return response;
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_id_accepted() {
        assert_eq!(
            accept_upstream("cf-8a1f:42").as_deref(),
            Some("cf-8a1f:42")
        );
    }

    #[test]
    fn test_suspicious_upstream_id_replaced() {
        assert_eq!(accept_upstream(""), None);
        assert_eq!(accept_upstream("id with spaces"), None);
        assert_eq!(accept_upstream(&"a".repeat(200)), None);
    }
}

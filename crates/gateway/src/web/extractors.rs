//! Request extractors shared across handlers.

/// Extracts the raw bearer token from `Authorization: Bearer <token>`,
/// without validating it — the gateway records tokens, it does not
/// authenticate end users.
pub fn bearer_token(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

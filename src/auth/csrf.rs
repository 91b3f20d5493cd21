//! CSRF token generation and validation.

use axum::http::HeaderMap;
use rand::RngCore;

/// The header mutating requests must use to present their CSRF token.
pub const CSRF_TOKEN_HEADER: &str = "x-csrf-token";

/// Generate a cryptographically secure CSRF token.
pub fn generate_csrf_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);

    hex::encode(bytes)
}

/// Check a client-supplied token against the session token.
///
/// The comparison is constant-time so that an attacker cannot recover the
/// token byte by byte from response timings.
pub fn validate_csrf_token(request_token: Option<&str>, session_token: &str) -> bool {
    let request_token = match request_token {
        Some(token) => token,
        None => return false,
    };

    if request_token.len() != session_token.len() || session_token.is_empty() {
        return false;
    }

    let mut difference = 0u8;
    for (left, right) in request_token.bytes().zip(session_token.bytes()) {
        difference |= left ^ right;
    }

    difference == 0
}

/// Extract the CSRF token from the request headers, if present.
pub fn extract_csrf_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(CSRF_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod csrf_tests {
    use axum::http::{HeaderMap, HeaderValue};

    use super::{
        CSRF_TOKEN_HEADER, extract_csrf_token, generate_csrf_token, validate_csrf_token,
    };

    #[test]
    fn generated_tokens_are_distinct_hex() {
        let first = generate_csrf_token();
        let second = generate_csrf_token();

        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, second);
    }

    #[test]
    fn matching_token_validates() {
        let token = generate_csrf_token();

        assert!(validate_csrf_token(Some(&token), &token));
    }

    #[test]
    fn missing_token_fails() {
        assert!(!validate_csrf_token(None, "abc"));
    }

    #[test]
    fn different_length_token_fails() {
        assert!(!validate_csrf_token(Some("abc"), "abcd"));
    }

    #[test]
    fn different_token_fails() {
        let session_token = generate_csrf_token();
        let request_token = generate_csrf_token();

        assert!(!validate_csrf_token(Some(&request_token), &session_token));
    }

    #[test]
    fn extracts_token_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert(CSRF_TOKEN_HEADER, HeaderValue::from_static("token"));

        assert_eq!(extract_csrf_token(&headers), Some("token"));
    }

    #[test]
    fn missing_header_is_none() {
        assert_eq!(extract_csrf_token(&HeaderMap::new()), None);
    }
}

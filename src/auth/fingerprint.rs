//! Client fingerprinting from request headers.
//!
//! The fingerprint binds a session to the client characteristics observed
//! at log-in, so that a stolen session cookie presented from a different
//! client is rejected.

use axum::http::HeaderMap;
use sha2::{Digest, Sha256};

/// The value reported when no forwarding header identifies the client.
const UNKNOWN_CLIENT: &str = "unknown";

/// Get the client IP from the usual forwarding headers.
///
/// Falls back to "unknown" when none are present, which still produces a
/// stable fingerprint for direct connections.
pub fn client_ip(headers: &HeaderMap) -> String {
    let forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    if let Some(ip) = forwarded_for {
        return ip.to_owned();
    }

    for header in ["x-real-ip", "x-client-ip", "cf-connecting-ip"] {
        if let Some(ip) = headers.get(header).and_then(|value| value.to_str().ok()) {
            return ip.to_owned();
        }
    }

    UNKNOWN_CLIENT.to_owned()
}

/// Compute the SHA-256 fingerprint of a request's client characteristics.
pub fn client_fingerprint(headers: &HeaderMap) -> String {
    let get = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
    };

    let mut hasher = Sha256::new();
    hasher.update(get("user-agent"));
    hasher.update("\n");
    hasher.update(get("accept-language"));
    hasher.update("\n");
    hasher.update(get("accept-encoding"));
    hasher.update("\n");
    hasher.update(client_ip(headers));

    hex::encode(hasher.finalize())
}

/// Check that the current request matches the fingerprint recorded in the
/// session.
pub fn validate_fingerprint(headers: &HeaderMap, session_fingerprint: &str) -> bool {
    client_fingerprint(headers) == session_fingerprint
}

#[cfg(test)]
mod fingerprint_tests {
    use axum::http::{HeaderMap, HeaderValue};

    use super::{client_fingerprint, client_ip, validate_fingerprint};

    fn headers_with(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn forwarded_for_takes_first_hop() {
        let headers = headers_with(&[("x-forwarded-for", "203.0.113.7, 10.0.0.1")]);

        assert_eq!(client_ip(&headers), "203.0.113.7");
    }

    #[test]
    fn real_ip_is_a_fallback() {
        let headers = headers_with(&[("x-real-ip", "203.0.113.9")]);

        assert_eq!(client_ip(&headers), "203.0.113.9");
    }

    #[test]
    fn missing_headers_report_unknown() {
        assert_eq!(client_ip(&HeaderMap::new()), "unknown");
    }

    #[test]
    fn same_headers_produce_same_fingerprint() {
        let headers = headers_with(&[
            ("user-agent", "test-agent"),
            ("accept-language", "en-NZ"),
            ("x-real-ip", "203.0.113.9"),
        ]);

        let fingerprint = client_fingerprint(&headers);

        assert!(validate_fingerprint(&headers, &fingerprint));
    }

    #[test]
    fn different_client_fails_validation() {
        let original = headers_with(&[("user-agent", "test-agent")]);
        let attacker = headers_with(&[("user-agent", "other-agent")]);

        let fingerprint = client_fingerprint(&original);

        assert!(!validate_fingerprint(&attacker, &fingerprint));
    }
}

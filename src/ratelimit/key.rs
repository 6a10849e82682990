//! Rate limit key construction and client identification.
//!
//! Keys follow the `"<operation>:<client>"` convention so that distinct
//! operations never share a counter for the same caller.

/// Client identifier used when no address header is present.
///
/// Every such caller shares one bucket per operation.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Compose the key for an operation and a client identifier.
pub fn compose_key(operation: &str, client: &str) -> String {
    format!("{}:{}", operation, client)
}

/// Resolve a best-effort client identifier from proxy headers.
///
/// Prefers the first entry of the forwarded-for header, then the real-ip
/// header, then [`UNKNOWN_CLIENT`]. Blank values are skipped.
pub fn resolve_client(forwarded_for: Option<&str>, real_ip: Option<&str>) -> String {
    forwarded_for
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .or_else(|| real_ip.map(str::trim).filter(|value| !value.is_empty()))
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_key() {
        assert_eq!(compose_key("auth-send", "203.0.113.7"), "auth-send:203.0.113.7");
        assert_eq!(compose_key("location", UNKNOWN_CLIENT), "location:unknown");
    }

    #[test]
    fn test_resolve_prefers_first_forwarded_entry() {
        let client = resolve_client(Some("203.0.113.7, 10.0.0.1, 10.0.0.2"), Some("10.9.9.9"));
        assert_eq!(client, "203.0.113.7");
    }

    #[test]
    fn test_resolve_falls_back_to_real_ip() {
        assert_eq!(resolve_client(None, Some(" 198.51.100.4 ")), "198.51.100.4");
        assert_eq!(resolve_client(Some("  "), Some("198.51.100.4")), "198.51.100.4");
        assert_eq!(resolve_client(Some(",10.0.0.1"), Some("198.51.100.4")), "198.51.100.4");
    }

    #[test]
    fn test_resolve_unknown() {
        assert_eq!(resolve_client(None, None), UNKNOWN_CLIENT);
        assert_eq!(resolve_client(Some(""), Some("")), UNKNOWN_CLIENT);
    }
}

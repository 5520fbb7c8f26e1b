//! Input validation helpers
//!
//! Identifier, xname, MAC and URL checks applied at the request boundary and
//! to nodes and boot configurations before they are used.

use std::sync::LazyLock;

use regex::Regex;

/// Longest identifier accepted from a boot request
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Host selector that makes a configuration the fallback for unmatched nodes
pub const DEFAULT_HOST: &str = "default";

static XNAME_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^x\d+c\d+s\d+b\d+n\d+$").ok());

/// Node xname: `x<cabinet>c<chassis>s<slot>b<bmc>n<node>`
pub fn is_valid_xname(xname: &str) -> bool {
    XNAME_RE.as_ref().is_some_and(|re| re.is_match(xname))
}

/// Host selector in a boot configuration
///
/// Accepts a node xname, the keyword `default`, or a glob pattern (`*`, `?`)
/// built from xname characters such as `x1000c0s*` or `x*`.
pub fn is_valid_host_pattern(pattern: &str) -> bool {
    if pattern == DEFAULT_HOST || is_valid_xname(pattern) {
        return true;
    }
    pattern.contains(['*', '?'])
        && pattern
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '*' || c == '?')
        && glob::Pattern::new(pattern).is_ok()
}

/// Canonical lower-case colon form of a MAC address
///
/// Accepts `:` or `-` separated octets or 12 bare hex digits, any case.
pub fn normalize_mac(mac: &str) -> Option<String> {
    let mac = mac.trim();
    let hex: String = if mac.len() == 12 {
        mac.to_string()
    } else if mac.len() == 17 {
        let sep = mac.as_bytes()[2];
        if sep != b':' && sep != b'-' {
            return None;
        }
        let mut digits = String::with_capacity(12);
        for (i, c) in mac.chars().enumerate() {
            if i % 3 == 2 {
                if c != char::from(sep) {
                    return None;
                }
            } else {
                digits.push(c);
            }
        }
        digits
    } else {
        return None;
    };

    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let hex = hex.to_ascii_lowercase();
    let octets: Vec<&str> = (0..6).map(|i| &hex[i * 2..i * 2 + 2]).collect();
    Some(octets.join(":"))
}

/// HTTP(S) URL or absolute filesystem path
pub fn is_valid_url_or_path(value: &str) -> bool {
    if let Some(rest) = value
        .strip_prefix("http://")
        .or_else(|| value.strip_prefix("https://"))
    {
        return !rest.is_empty() && !rest.starts_with('/') && !rest.contains(char::is_whitespace);
    }
    value.starts_with('/') && value.len() > 1
}

/// Validate a raw boot request identifier
pub fn validate_identifier(identifier: &str) -> Result<(), String> {
    let trimmed = identifier.trim();
    if trimmed.is_empty() {
        return Err("identifier is empty".to_string());
    }
    if trimmed.len() > MAX_IDENTIFIER_LEN {
        return Err(format!(
            "identifier exceeds {MAX_IDENTIFIER_LEN} characters"
        ));
    }
    if let Some(bad) = trimmed
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, ':' | '-' | '_' | '.')))
    {
        return Err(format!("identifier contains invalid character '{bad}'"));
    }
    Ok(())
}

/// Canonical form used for cache keys and logging
///
/// MAC addresses are normalized; all-digit identifiers stay as NIDs; anything
/// else is returned trimmed.
pub fn canonical_identifier(identifier: &str) -> String {
    let trimmed = identifier.trim();
    if trimmed.chars().all(|c| c.is_ascii_digit()) {
        return trimmed.to_string();
    }
    normalize_mac(trimmed).unwrap_or_else(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xname() {
        assert!(is_valid_xname("x1000c0s0b0n0"));
        assert!(is_valid_xname("x0c0s0b0n0"));
        assert!(!is_valid_xname("x1000c0s0b0"));
        assert!(!is_valid_xname("node001"));
        assert!(!is_valid_xname(""));
    }

    #[test]
    fn test_host_pattern() {
        assert!(is_valid_host_pattern("x1000c0s0b0n0"));
        assert!(is_valid_host_pattern("x1000c0s*"));
        assert!(is_valid_host_pattern("x*"));
        assert!(is_valid_host_pattern("default"));
        assert!(!is_valid_host_pattern("x1000c0s0"));
        assert!(!is_valid_host_pattern("x1000/*"));
    }

    #[test]
    fn test_normalize_mac() {
        assert_eq!(
            normalize_mac("A4:BF:01:00:00:01").as_deref(),
            Some("a4:bf:01:00:00:01")
        );
        assert_eq!(
            normalize_mac("a4-bf-01-00-00-01").as_deref(),
            Some("a4:bf:01:00:00:01")
        );
        assert_eq!(normalize_mac("a4bf01000001").as_deref(), Some("a4:bf:01:00:00:01"));
        assert_eq!(normalize_mac("a4:bf-01:00:00:01"), None, "mixed separators");
        assert_eq!(normalize_mac("g4:bf:01:00:00:01"), None);
        assert_eq!(normalize_mac("a4:bf:01:00:00"), None);
        assert_eq!(normalize_mac(""), None);
    }

    #[test]
    fn test_url_or_path() {
        assert!(is_valid_url_or_path("http://boot/vmlinuz"));
        assert!(is_valid_url_or_path("https://boot.example.com/k"));
        assert!(is_valid_url_or_path("/srv/boot/vmlinuz"));
        assert!(!is_valid_url_or_path("/"));
        assert!(!is_valid_url_or_path("vmlinuz"));
        assert!(!is_valid_url_or_path("ftp://boot/vmlinuz"));
        assert!(!is_valid_url_or_path("http://"));
        assert!(!is_valid_url_or_path(""));
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("x1000c0s0b0n0").is_ok());
        assert!(validate_identifier("42").is_ok());
        assert!(validate_identifier("a4:bf:01:00:00:01").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("   ").is_err());
        assert!(validate_identifier("x1000c0s0b0n0; reboot").is_err());
        assert!(validate_identifier("{{kernel}}").is_err());
        assert!(validate_identifier(&"x".repeat(MAX_IDENTIFIER_LEN + 1)).is_err());
    }

    #[test]
    fn test_canonical_identifier() {
        assert_eq!(canonical_identifier(" A4-BF-01-00-00-01 "), "a4:bf:01:00:00:01");
        assert_eq!(canonical_identifier("000000000001"), "000000000001", "digits stay a NID");
        assert_eq!(canonical_identifier("x1000c0s0b0n0"), "x1000c0s0b0n0");
    }
}

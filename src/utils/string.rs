//! String helpers for link and remark processing

/// Percent-decodes a string as UTF-8, returning the input unchanged when the
/// escape sequences are malformed.
pub fn url_decode(input: &str) -> String {
    match urlencoding::decode(input) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => input.to_string(),
    }
}

/// Unescapes a JSON string literal body.
///
/// Some generators double-escape non-ASCII remarks (`\uXXXX` sequences inside
/// an already-encoded name). Interpreting the value as a JSON string literal
/// recovers the original text; anything that is not a valid literal is kept
/// as-is.
pub fn unescape_json_literal(input: &str) -> String {
    match serde_json::from_str::<String>(&format!("\"{}\"", input)) {
        Ok(unescaped) => unescaped,
        Err(_) => input.to_string(),
    }
}

/// Normalizes a decoded remark: percent-decode, JSON-unescape, then treat
/// empty, whitespace-only and the literal placeholder `vmess` as absent.
pub fn normalize_remark(raw: &str) -> Option<String> {
    let name = unescape_json_literal(&url_decode(raw));
    if name.trim().is_empty() || name == "vmess" {
        None
    } else {
        Some(name)
    }
}

/// Checks whether a string has the canonical hyphenated UUID shape.
pub fn is_uuid(input: &str) -> bool {
    input.len() == 36 && uuid::Uuid::parse_str(input).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_decode_utf8() {
        assert_eq!(url_decode("%E6%B5%8B%E8%AF%95"), "测试");
        assert_eq!(url_decode("plain"), "plain");
    }

    #[test]
    fn test_unescape_json_literal() {
        assert_eq!(unescape_json_literal("\\u6d4b\\u8bd5"), "测试");
        assert_eq!(unescape_json_literal("node1"), "node1");
    }

    #[test]
    fn test_normalize_remark_placeholders() {
        assert_eq!(normalize_remark(""), None);
        assert_eq!(normalize_remark("   "), None);
        assert_eq!(normalize_remark("vmess"), None);
        assert_eq!(normalize_remark("node1"), Some("node1".to_string()));
    }

    #[test]
    fn test_is_uuid() {
        assert!(is_uuid("11111111-2222-3333-4444-555555555555"));
        assert!(!is_uuid("password"));
        assert!(!is_uuid("111111112222333344445555555555555555"));
    }
}

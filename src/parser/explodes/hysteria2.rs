use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{Proxy, ProxyKind};
use crate::utils::normalize_remark;

static HYSTERIA2_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:hysteria2|hy2)://([^@]+)@([^:]+):(\d+)(?:[?]([^#]+))?(?:#(.+))?$").unwrap()
});

/// Decodes a `hysteria2://` or `hy2://` link; both spellings are equivalent.
pub fn explode_hysteria2(link: &str) -> Option<Proxy> {
    let caps = HYSTERIA2_RE.captures(link)?;
    let password = caps.get(1)?.as_str().to_string();
    let server = caps.get(2)?.as_str();
    let port: u16 = caps.get(3)?.as_str().parse().ok()?;

    let mut sni = None;
    let mut skip_cert_verify = false;
    if let Some(params) = caps.get(4) {
        for param in params.as_str().split('&') {
            match param.split_once('=') {
                Some(("sni", value)) => sni = Some(value.to_string()),
                Some(("insecure", value)) => skip_cert_verify = value == "1",
                _ => {}
            }
        }
    }

    let name = caps.get(5).and_then(|m| normalize_remark(m.as_str()));
    Some(Proxy::new(
        ProxyKind::Hysteria2 {
            password,
            sni,
            skip_cert_verify,
        },
        name,
        server,
        port,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explode_hysteria2() {
        let link = "hysteria2://hpw@hy.example.com:8443?sni=hy.example.com&insecure=1#hy";
        let node = explode_hysteria2(link).expect("valid hysteria2");
        assert_eq!(node.server, "hy.example.com");
        assert_eq!(node.port, 8443);
        assert_eq!(
            node.kind,
            ProxyKind::Hysteria2 {
                password: "hpw".to_string(),
                sni: Some("hy.example.com".to_string()),
                skip_cert_verify: true,
            }
        );
    }

    #[test]
    fn test_hy2_spelling_equivalent() {
        let a = explode_hysteria2("hysteria2://p@h.example.com:1?sni=s#n").unwrap();
        let b = explode_hysteria2("hy2://p@h.example.com:1?sni=s#n").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_explode_hysteria2_invalid() {
        assert!(explode_hysteria2("hysteria2://h.example.com:1").is_none());
    }
}

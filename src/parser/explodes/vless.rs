use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{Proxy, ProxyKind, Transport};
use crate::utils::normalize_remark;

static VLESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^vless://([^@]+)@([^:]+):(\d+)(?:[?]([^#]+))?(?:#(.+))?$").unwrap());

/// Decodes a `vless://uuid@host:port?encryption=&type=&path=&host=&security=&sni=#name` link.
pub fn explode_vless(link: &str) -> Option<Proxy> {
    let caps = VLESS_RE.captures(link)?;
    let uuid = caps.get(1)?.as_str().to_string();
    let server = caps.get(2)?.as_str();
    let port: u16 = caps.get(3)?.as_str().parse().ok()?;

    let mut cipher = None;
    let mut tls = false;
    let mut sni = None;
    let mut network = String::new();
    let mut path = "/".to_string();
    let mut host = None;
    if let Some(params) = caps.get(4) {
        for param in params.as_str().split('&') {
            match param.split_once('=') {
                Some(("encryption", value)) => cipher = Some(value.to_string()),
                Some(("type", value)) => network = value.to_string(),
                Some(("path", value)) => path = value.to_string(),
                Some(("host", value)) => host = Some(value.to_string()),
                Some(("security", value)) => tls = value == "tls",
                Some(("sni", value)) => sni = Some(value.to_string()),
                _ => {}
            }
        }
    }

    let name = caps.get(5).and_then(|m| normalize_remark(m.as_str()));
    let mut node = Proxy::new(
        ProxyKind::Vless {
            uuid,
            cipher,
            tls,
            sni,
        },
        name,
        server,
        port,
    );
    if network == "ws" {
        node.transport = Some(Transport::Ws { path, host });
    }
    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explode_vless_full() {
        let link = "vless://uuid-3@v.example.com:443?encryption=none&type=ws&path=/v&host=cdn.com&security=tls&sni=v.example.com#vnode";
        let node = explode_vless(link).expect("valid vless");
        assert_eq!(node.server, "v.example.com");
        assert_eq!(node.port, 443);
        assert_eq!(node.name.as_deref(), Some("vnode"));
        assert_eq!(
            node.kind,
            ProxyKind::Vless {
                uuid: "uuid-3".to_string(),
                cipher: Some("none".to_string()),
                tls: true,
                sni: Some("v.example.com".to_string()),
            }
        );
        assert_eq!(
            node.transport,
            Some(Transport::Ws {
                path: "/v".to_string(),
                host: Some("cdn.com".to_string()),
            })
        );
    }

    #[test]
    fn test_explode_vless_minimal() {
        let node = explode_vless("vless://u@h.example.com:8443").expect("minimal vless");
        assert_eq!(node.name, None);
        assert_eq!(node.transport, None);
        assert!(matches!(node.kind, ProxyKind::Vless { tls: false, .. }));
    }

    #[test]
    fn test_explode_vless_invalid() {
        assert!(explode_vless("vless://nouserinfo:443").is_none());
        assert!(explode_vless("vless://u@h:notaport").is_none());
    }
}

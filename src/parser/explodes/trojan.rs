use url::Url;

use crate::models::{Proxy, ProxyKind, Transport};
use crate::utils::{base64_decode, normalize_remark};

/// Decodes a `trojan://` link.
///
/// Primary form is URI-structural. Generators that skip URL-escaping the
/// password produce links that fail structural parsing; those are covered by
/// a fully Base64-wrapped `password@host:port?params` fallback.
pub fn explode_trojan(link: &str) -> Option<Proxy> {
    if !link.starts_with("trojan://") {
        return None;
    }
    if let Some(node) = structural(link) {
        return Some(node);
    }
    wrapped(link)
}

fn truthy(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

fn structural(link: &str) -> Option<Proxy> {
    let url = Url::parse(link).ok()?;
    let server = url.host_str()?.to_string();
    let port = url.port()?;
    let password = url.username().to_string();
    if password.is_empty() {
        return None;
    }

    let mut sni = None;
    let mut skip_cert_verify = false;
    let mut network = String::new();
    let mut path = "/".to_string();
    let mut host = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "sni" => sni = Some(value.to_string()),
            "allowInsecure" => skip_cert_verify = truthy(&value),
            "type" => network = value.to_string(),
            "path" => path = value.to_string(),
            "host" => host = Some(value.to_string()),
            _ => {}
        }
    }

    let name = url.fragment().and_then(normalize_remark);
    let mut node = Proxy::new(
        ProxyKind::Trojan {
            password,
            sni,
            skip_cert_verify,
        },
        name,
        &server,
        port,
    );
    if network == "ws" {
        node.transport = Some(Transport::Ws { path, host });
    }
    Some(node)
}

/// Fallback: `trojan://base64(password@host:port?params)#name`.
fn wrapped(link: &str) -> Option<Proxy> {
    let rest = &link[9..];
    let payload = rest.split('#').next()?;
    let decoded = base64_decode(payload)?;

    let (password, server_part) = decoded.split_once('@')?;
    let (server, port_part) = server_part.split_once(':')?;
    let (port, params) = match port_part.split_once('?') {
        Some((port, params)) => (port, params),
        None => (port_part, ""),
    };
    let port: u16 = port.parse().ok()?;

    let mut sni = None;
    let mut skip_cert_verify = false;
    for param in params.split('&') {
        match param.split_once('=') {
            Some(("sni", value)) if !value.is_empty() => sni = Some(value.to_string()),
            Some(("allowInsecure", value)) => skip_cert_verify = truthy(value),
            _ => {}
        }
    }

    let name = link
        .split_once('#')
        .and_then(|(_, frag)| normalize_remark(frag));
    Some(Proxy::new(
        ProxyKind::Trojan {
            password: password.to_string(),
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
    fn test_explode_trojan_structural() {
        let link =
            "trojan://pw@9.9.9.9:443?sni=x.com&allowInsecure=1&type=ws&path=/t&host=h.com#t%20one";
        let node = explode_trojan(link).expect("structural trojan");
        assert_eq!(node.server, "9.9.9.9");
        assert_eq!(node.port, 443);
        assert_eq!(node.name.as_deref(), Some("t one"));
        assert_eq!(
            node.kind,
            ProxyKind::Trojan {
                password: "pw".to_string(),
                sni: Some("x.com".to_string()),
                skip_cert_verify: true,
            }
        );
        assert_eq!(
            node.transport,
            Some(Transport::Ws {
                path: "/t".to_string(),
                host: Some("h.com".to_string()),
            })
        );
    }

    #[test]
    fn test_explode_trojan_wrapped() {
        // base64("pw@9.9.9.9:443?sni=x.com&allowInsecure=1")
        let link = "trojan://cHdAOS45LjkuOTo0NDM/c25pPXguY29tJmFsbG93SW5zZWN1cmU9MQ==#wrapped";
        let node = explode_trojan(link).expect("wrapped trojan");
        assert_eq!(node.server, "9.9.9.9");
        assert_eq!(node.port, 443);
        assert_eq!(node.name.as_deref(), Some("wrapped"));
        assert_eq!(
            node.kind,
            ProxyKind::Trojan {
                password: "pw".to_string(),
                sni: Some("x.com".to_string()),
                skip_cert_verify: true,
            }
        );
    }

    #[test]
    fn test_explode_trojan_missing_port() {
        assert!(explode_trojan("trojan://pw@host").is_none());
    }
}

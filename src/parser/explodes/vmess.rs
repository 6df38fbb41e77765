use serde_json::Value;
use url::Url;

use crate::models::{Proxy, ProxyKind, Transport};
use crate::utils::{base64_decode, normalize_remark};

/// Builds the transport overlay from a vmess-style `net`/`path`/`host` triple.
pub(crate) fn transport_from_net(net: &str, path: &str, host: &str) -> Option<Transport> {
    let host = if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    };
    let path = if path.is_empty() { "/" } else { path };
    match net {
        "ws" => Some(Transport::Ws {
            path: path.to_string(),
            host,
        }),
        "h2" => Some(Transport::H2 {
            path: path.to_string(),
            host,
        }),
        "grpc" => Some(Transport::Grpc {
            // vmess JSON reuses the path key for the gRPC service name
            service_name: if path == "/" { String::new() } else { path.to_string() },
        }),
        _ => None,
    }
}

fn json_str(value: &Value, key: &str) -> String {
    value[key].as_str().unwrap_or("").to_string()
}

/// Reads a port that may be encoded as either a JSON string or a number.
fn json_port(value: &Value) -> Option<u16> {
    match &value["port"] {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        _ => None,
    }
}

/// Decodes a vmess-shaped JSON payload into a Proxy. Shared with the ss
/// decoder, whose extraction pattern picks up embedded vmess payloads.
pub(crate) fn proxy_from_vmess_json(data: &Value, name: Option<String>) -> Option<Proxy> {
    let server = json_str(data, "add");
    let port = json_port(data)?;
    let uuid = json_str(data, "id");
    if server.is_empty() || uuid.is_empty() {
        return None;
    }
    let alter_id = match &data["aid"] {
        Value::String(s) => s.parse().unwrap_or(0),
        Value::Number(n) => n.as_u64().unwrap_or(0) as u16,
        _ => 0,
    };
    let cipher = match data["scy"].as_str() {
        Some(c) if !c.is_empty() => c.to_string(),
        _ => "auto".to_string(),
    };
    let name = name.or_else(|| normalize_remark(&json_str(data, "ps")));

    let mut node = Proxy::new(
        ProxyKind::Vmess {
            uuid,
            alter_id,
            cipher,
            tls: json_str(data, "tls") == "tls",
        },
        name,
        &server,
        port,
    );
    node.transport = transport_from_net(
        data["net"].as_str().unwrap_or("tcp"),
        &json_str(data, "path"),
        &json_str(data, "host"),
    );
    Some(node)
}

/// Decodes a `vmess://` link.
///
/// Primary form is Base64-wrapped JSON. Two fallbacks cover the wild:
/// a Base64-wrapped `method:password@host:port` payload (emitted by some
/// generators under the vmess scheme, actually a shadowsocks node) and a
/// plain URL-structural form with query parameters.
pub fn explode_vmess(link: &str) -> Option<Proxy> {
    let rest = link.strip_prefix("vmess://")?;
    let payload = rest.split('#').next().unwrap_or(rest);

    if let Some(raw) = base64_decode(payload) {
        if raw.contains(':') && raw.contains('@') && !raw.starts_with('{') {
            if let Some(node) = legacy_ss_payload(&raw) {
                return Some(node);
            }
        }
        if let Ok(data) = serde_json::from_str::<Value>(&raw) {
            if let Some(node) = proxy_from_vmess_json(&data, None) {
                return Some(node);
            }
        }
    }

    explode_vmess_url(link)
}

/// The legacy colon-delimited payload: `method:password@host:port`.
fn legacy_ss_payload(raw: &str) -> Option<Proxy> {
    let (userinfo, server_part) = raw.split_once('@')?;
    let (method, password) = userinfo.split_once(':')?;
    let (server, port) = server_part.split_once(':')?;
    let port: u16 = port.parse().ok()?;
    Some(Proxy::new(
        ProxyKind::Shadowsocks {
            cipher: method.to_string(),
            password: password.to_string(),
        },
        None,
        server,
        port,
    ))
}

/// URL-structural fallback: `vmess://uuid@host:port?aid=&scy=&net=&path=&host=#name`.
fn explode_vmess_url(link: &str) -> Option<Proxy> {
    let url = Url::parse(link).ok()?;
    let server = url.host_str()?.to_string();
    let port = url.port()?;

    let mut uuid = url.username().to_string();
    let mut alter_id = 0u16;
    let mut cipher = "auto".to_string();
    let mut tls = false;
    let mut net = "tcp".to_string();
    let mut path = String::new();
    let mut host = String::new();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "uuid" if uuid.is_empty() => uuid = value.to_string(),
            "aid" => alter_id = value.parse().unwrap_or(0),
            "scy" => cipher = value.to_string(),
            "tls" => tls = value == "tls",
            "net" => net = value.to_string(),
            "path" => path = value.to_string(),
            "host" => host = value.to_string(),
            _ => {}
        }
    }
    if uuid.is_empty() {
        return None;
    }

    let name = url.fragment().and_then(normalize_remark);
    let mut node = Proxy::new(
        ProxyKind::Vmess {
            uuid,
            alter_id,
            cipher,
            tls,
        },
        name,
        &server,
        port,
    );
    node.transport = transport_from_net(&net, &path, &host);
    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explode_vmess_json() {
        let link = "vmess://eyJ2IjoiMiIsImFkZCI6ImEuZXhhbXBsZS5jb20iLCJwb3J0IjoiNDQzIiwiaWQiOiJ1dWlkLTEiLCJhaWQiOiIwIiwibmV0IjoidGNwIiwicHMiOiJub2RlMSJ9";
        let node = explode_vmess(link).expect("valid vmess json");
        assert_eq!(node.server, "a.example.com");
        assert_eq!(node.port, 443);
        assert_eq!(node.name.as_deref(), Some("node1"));
        assert_eq!(node.transport, None);
        match node.kind {
            ProxyKind::Vmess { uuid, alter_id, .. } => {
                assert_eq!(uuid, "uuid-1");
                assert_eq!(alter_id, 0);
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_explode_vmess_ws_tls() {
        let link = "vmess://eyJ2IjogIjIiLCAiYWRkIjogIndzLmV4YW1wbGUuY29tIiwgInBvcnQiOiAiODQ0MyIsICJpZCI6ICIxMTExMTExMS0yMjIyLTMzMzMtNDQ0NC01NTU1NTU1NTU1NTUiLCAiYWlkIjogIjIiLCAibmV0IjogIndzIiwgInBhdGgiOiAiL3N1YiIsICJob3N0IjogImNkbi5leGFtcGxlLmNvbSIsICJ0bHMiOiAidGxzIiwgInNjeSI6ICJhdXRvIiwgInBzIjogIndzLW5vZGUifQ==";
        let node = explode_vmess(link).expect("valid vmess ws");
        assert_eq!(node.server, "ws.example.com");
        assert_eq!(node.port, 8443);
        assert_eq!(
            node.transport,
            Some(Transport::Ws {
                path: "/sub".to_string(),
                host: Some("cdn.example.com".to_string()),
            })
        );
        match node.kind {
            ProxyKind::Vmess { tls, .. } => assert!(tls),
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_explode_vmess_legacy_ss_payload() {
        // base64("aes-256-gcm:pwd123@1.2.3.4:8388")
        let link = "vmess://YWVzLTI1Ni1nY206cHdkMTIzQDEuMi4zLjQ6ODM4OA==";
        let node = explode_vmess(link).expect("legacy payload");
        assert_eq!(node.server, "1.2.3.4");
        assert_eq!(node.port, 8388);
        assert_eq!(
            node.kind,
            ProxyKind::Shadowsocks {
                cipher: "aes-256-gcm".to_string(),
                password: "pwd123".to_string(),
            }
        );
    }

    #[test]
    fn test_explode_vmess_url_form() {
        let link = "vmess://uuid-7@h.example.com:443?aid=1&net=ws&path=/x&host=cdn.example.com&tls=tls#name%201";
        let node = explode_vmess(link).expect("url form");
        assert_eq!(node.server, "h.example.com");
        assert_eq!(node.name.as_deref(), Some("name 1"));
        assert_eq!(
            node.transport,
            Some(Transport::Ws {
                path: "/x".to_string(),
                host: Some("cdn.example.com".to_string()),
            })
        );
    }

    #[test]
    fn test_explode_vmess_garbage() {
        assert!(explode_vmess("vmess://notbase64!!!").is_none());
        assert!(explode_vmess("trojan://pw@h:1").is_none());
    }

    #[test]
    fn test_placeholder_name_dropped() {
        // ps = "vmess" is treated as absent
        let payload = serde_json::json!({
            "add": "x.example.com", "port": "443", "id": "u", "aid": "0",
            "net": "tcp", "ps": "vmess"
        });
        let node = proxy_from_vmess_json(&payload, None).unwrap();
        assert_eq!(node.name, None);
        assert_eq!(node.display_name(), "x.example.com:443");
    }
}

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use url::Url;

use super::vmess::proxy_from_vmess_json;
use crate::models::{Proxy, ProxyKind};
use crate::utils::{base64_decode, is_uuid, normalize_remark, url_decode};

static SIP002_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^ss://([A-Za-z0-9+/=%]+)@([^:]+):(\d+)(?:[?][^#]*)?(?:#(.+))?$").unwrap()
});
static PLAIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ss://([^@]+)@([^:]+):(\d+)(?:[?][^#]*)?(?:#(.+))?$").unwrap());

/// Decodes an `ss://` link.
///
/// Tried in order: an embedded vmess-shaped JSON payload (the extraction
/// pattern matches the tail of vmess links, and some generators ship such
/// payloads under the ss scheme), SIP002, the fully Base64-wrapped legacy
/// form, an explicit query-parameter form, and finally a plain-userinfo form
/// that also covers uuid-as-password links.
pub fn explode_ss(link: &str) -> Option<Proxy> {
    if !link.starts_with("ss://") {
        return None;
    }
    let fragment_name = link
        .split_once('#')
        .and_then(|(_, frag)| normalize_remark(frag));

    if link.len() > 100 {
        if let Some(node) = embedded_vmess(link, fragment_name.clone()) {
            return Some(node);
        }
    }
    if let Some(node) = sip002(link, fragment_name.clone()) {
        return Some(node);
    }
    if !link.contains('@') {
        if let Some(node) = wrapped_legacy(link, fragment_name.clone()) {
            return Some(node);
        }
    }
    if let Some(node) = query_params(link, fragment_name.clone()) {
        return Some(node);
    }
    plain_userinfo(link, fragment_name)
}

/// Strategy 1: `ss://base64({"add": ..., "port": ..., "id": ...})`.
///
/// When both a fragment name and an embedded `ps` remark exist, the longer
/// of the two wins; generators tend to truncate one of them.
fn embedded_vmess(link: &str, name: Option<String>) -> Option<Proxy> {
    let payload = link[5..].split('#').next()?;
    let raw = base64_decode(payload)?;
    if !(raw.starts_with('{') && raw.ends_with('}')) {
        return None;
    }
    let data: Value = serde_json::from_str(&raw).ok()?;
    let mut node = proxy_from_vmess_json(&data, None)?;
    if let Some(fragment) = name {
        let keep_fragment = node
            .name
            .as_ref()
            .map_or(true, |ps| fragment.chars().count() > ps.chars().count());
        if keep_fragment {
            node.name = Some(fragment);
        }
    }
    Some(node)
}

/// Strategy 2: SIP002, `ss://base64(method:password)@host:port`.
fn sip002(link: &str, name: Option<String>) -> Option<Proxy> {
    let caps = SIP002_RE.captures(link)?;
    let userinfo = url_decode(caps.get(1)?.as_str());
    let decoded = base64_decode(&userinfo)?;
    let (method, password) = decoded.split_once(':')?;
    let port: u16 = caps.get(3)?.as_str().parse().ok()?;
    Some(Proxy::new(
        ProxyKind::Shadowsocks {
            cipher: method.to_string(),
            password: password.to_string(),
        },
        name,
        caps.get(2)?.as_str(),
        port,
    ))
}

/// Strategy 3: `ss://base64(method:password@host:port)`.
fn wrapped_legacy(link: &str, name: Option<String>) -> Option<Proxy> {
    let payload = link[5..].split('#').next()?;
    let decoded = base64_decode(payload)?;
    let (userinfo, server_part) = decoded.split_once('@')?;
    let (method, password) = userinfo.split_once(':')?;
    let (server, port) = server_part.split_once(':')?;
    let port: u16 = port.parse().ok()?;
    Some(Proxy::new(
        ProxyKind::Shadowsocks {
            cipher: method.to_string(),
            password: password.to_string(),
        },
        name,
        server,
        port,
    ))
}

/// Strategy 4: explicit `?method=...&password=...` query parameters.
fn query_params(link: &str, name: Option<String>) -> Option<Proxy> {
    let url = Url::parse(link).ok()?;
    let server = url.host_str()?.to_string();
    let port = url.port()?;
    let mut method = None;
    let mut password = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "method" => method = Some(value.to_string()),
            "password" => password = Some(value.to_string()),
            _ => {}
        }
    }
    Some(Proxy::new(
        ProxyKind::Shadowsocks {
            cipher: method?,
            password: password?,
        },
        name,
        &server,
        port,
    ))
}

/// Strategy 5: plain or Base64 userinfo, including the `ss://uuid@host:port`
/// form where the userinfo is an unauthenticated VLESS-style uuid and the
/// `encryption` query parameter supplies the cipher.
fn plain_userinfo(link: &str, name: Option<String>) -> Option<Proxy> {
    let caps = PLAIN_RE.captures(link)?;
    let userinfo = url_decode(caps.get(1)?.as_str());
    let server = caps.get(2)?.as_str();
    let port: u16 = caps.get(3)?.as_str().parse().ok()?;

    if let Some((method, password)) = userinfo.split_once(':') {
        return Some(Proxy::new(
            ProxyKind::Shadowsocks {
                cipher: method.to_string(),
                password: password.to_string(),
            },
            name,
            server,
            port,
        ));
    }

    if is_uuid(&userinfo) {
        let mut cipher = "none".to_string();
        if let Some(query) = link.split_once('?').map(|(_, q)| q) {
            let query = query.split('#').next().unwrap_or(query);
            for param in query.split('&') {
                if let Some(("encryption", value)) = param.split_once('=') {
                    cipher = value.to_string();
                }
            }
        }
        return Some(Proxy::new(
            ProxyKind::Shadowsocks {
                cipher,
                password: userinfo,
            },
            name,
            server,
            port,
        ));
    }

    let decoded = base64_decode(&userinfo)?;
    let (method, password) = decoded.split_once(':')?;
    Some(Proxy::new(
        ProxyKind::Shadowsocks {
            cipher: method.to_string(),
            password: password.to_string(),
        },
        name,
        server,
        port,
    ))
}

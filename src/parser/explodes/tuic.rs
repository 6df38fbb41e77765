use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{Proxy, ProxyKind};
use crate::utils::normalize_remark;

static TUIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^tuic://([^@]+)@([^:]+):(\d+)(?:[?]([^#]+))?(?:#(.+))?$").unwrap());

/// Decodes a `tuic://uuid@host:port?sni=&insecure=#name` link.
pub fn explode_tuic(link: &str) -> Option<Proxy> {
    let caps = TUIC_RE.captures(link)?;
    let uuid = caps.get(1)?.as_str().to_string();
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
        ProxyKind::Tuic {
            uuid,
            sni,
            skip_cert_verify,
        },
        name,
        server,
        port,
    ))
}

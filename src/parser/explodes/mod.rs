//! Per-protocol link decoders.
//!
//! Every decoder is a pure function from one link to `Option<Proxy>`;
//! decode failures are data, not errors, and never abort a run.

mod hysteria2;
mod ss;
mod ssr;
mod trojan;
mod tuic;
mod vless;
mod vmess;

pub use hysteria2::explode_hysteria2;
pub use ss::explode_ss;
pub use ssr::explode_ssr;
pub use trojan::explode_trojan;
pub use tuic::explode_tuic;
pub use vless::explode_vless;
pub use vmess::explode_vmess;

use crate::models::Proxy;
use crate::utils::base64_decode;

/// Decodes a single link by scheme, probing Base64 payloads of unrecognized
/// schemes as a last resort.
pub fn explode(link: &str) -> Option<Proxy> {
    if link.starts_with("vmess://") {
        explode_vmess(link)
    } else if link.starts_with("ss://") {
        explode_ss(link)
    } else if link.starts_with("trojan://") {
        explode_trojan(link)
    } else if link.starts_with("vless://") {
        explode_vless(link)
    } else if link.starts_with("ssr://") {
        explode_ssr(link)
    } else if link.starts_with("hysteria2://") || link.starts_with("hy2://") {
        explode_hysteria2(link)
    } else if link.starts_with("tuic://") {
        explode_tuic(link)
    } else {
        explode_unknown(link)
    }
}

/// Probes a link with an unknown scheme by shape of its decoded payload:
/// vmess-style JSON, `method:password@host:port`, or `password@host:port`.
fn explode_unknown(link: &str) -> Option<Proxy> {
    let (_, content) = link.split_once("://")?;
    let payload = content.split('#').next()?;
    let decoded = base64_decode(payload)?;

    if decoded.starts_with('{') && decoded.contains("\"add\"") {
        let rewritten = format!("vmess://{}", payload);
        return explode_vmess(&rewritten);
    }
    if let Some((userinfo, server_part)) = decoded.split_once('@') {
        if userinfo.contains(':') && server_part.contains(':') {
            let rewritten = format!("ss://{}", payload);
            return explode_ss(&rewritten);
        }
        if server_part.contains(':') {
            let rewritten = format!("trojan://{}", payload);
            return explode_trojan(&rewritten);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProxyKind;

    #[test]
    fn test_explode_dispatch() {
        assert!(explode("hy2://p@h.example.com:1#n").is_some());
        assert!(explode("tuic://u@h.example.com:1#n").is_some());
        assert!(explode("garbage").is_none());
    }

    #[test]
    fn test_explode_unknown_scheme_with_ss_payload() {
        // base64("aes-128-gcm:pass@5.6.7.8:443") under an alien scheme
        let node = explode("weird://YWVzLTEyOC1nY206cGFzc0A1LjYuNy44OjQ0Mw==").expect("probed");
        assert!(matches!(node.kind, ProxyKind::Shadowsocks { .. }));
    }
}

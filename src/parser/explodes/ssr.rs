use crate::models::{Proxy, ProxyKind};
use crate::utils::base64_decode;

/// Decodes an `ssr://` link.
///
/// The entire body is Base64; the payload is
/// `server:port:protocol:method:obfs:base64(password)/?params` where the
/// `remarks` param is itself Base64. A degenerate `server:port` payload is
/// accepted with origin/none/plain defaults.
pub fn explode_ssr(link: &str) -> Option<Proxy> {
    let encoded = link.strip_prefix("ssr://")?;
    let raw = base64_decode(encoded)?;

    let (main_part, params_part) = match raw.split_once('/') {
        Some((main, params)) => (main, params),
        None => (raw.as_str(), ""),
    };

    let fields: Vec<&str> = main_part.split(':').collect();
    let (server, port, protocol, method, obfs, password) = if fields.len() >= 6 {
        let password = if fields[5].is_empty() {
            String::new()
        } else {
            base64_decode(fields[5]).unwrap_or_default()
        };
        (
            fields[0],
            fields[1],
            fields[2].to_string(),
            fields[3].to_string(),
            fields[4].to_string(),
            password,
        )
    } else if fields.len() >= 2 {
        (
            fields[0],
            fields[1],
            "origin".to_string(),
            "none".to_string(),
            "plain".to_string(),
            String::new(),
        )
    } else {
        return None;
    };
    let port: u16 = port.parse().ok()?;

    let name = params_part
        .trim_start_matches('?')
        .split('&')
        .find_map(|param| param.strip_prefix("remarks="))
        .and_then(base64_decode);

    Some(Proxy::new(
        ProxyKind::ShadowsocksR {
            cipher: method,
            password,
            protocol,
            obfs,
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
    fn test_explode_ssr_full() {
        // base64("1.2.3.4:8080:origin:aes-256-cfb:plain:base64(ssrpass)/?remarks=base64(ssr-node)")
        let link = "ssr://MS4yLjMuNDo4MDgwOm9yaWdpbjphZXMtMjU2LWNmYjpwbGFpbjpjM055Y0dGemN3Lz9yZW1hcmtzPWMzTnlMVzV2WkdV";
        let node = explode_ssr(link).expect("valid ssr");
        assert_eq!(node.server, "1.2.3.4");
        assert_eq!(node.port, 8080);
        assert_eq!(node.name.as_deref(), Some("ssr-node"));
        assert_eq!(
            node.kind,
            ProxyKind::ShadowsocksR {
                cipher: "aes-256-cfb".to_string(),
                password: "ssrpass".to_string(),
                protocol: "origin".to_string(),
                obfs: "plain".to_string(),
            }
        );
    }

    #[test]
    fn test_explode_ssr_short_form() {
        // base64("9.9.9.9:443")
        let link = "ssr://OS45LjkuOTo0NDM=";
        let node = explode_ssr(link).expect("short ssr");
        assert_eq!(node.server, "9.9.9.9");
        assert_eq!(
            node.kind,
            ProxyKind::ShadowsocksR {
                cipher: "none".to_string(),
                password: String::new(),
                protocol: "origin".to_string(),
                obfs: "plain".to_string(),
            }
        );
    }

    #[test]
    fn test_explode_ssr_invalid() {
        assert!(explode_ssr("ssr://!!!").is_none());
        // base64("justoneword") has no colon-delimited endpoint
        assert!(explode_ssr("ssr://anVzdG9uZXdvcmQ=").is_none());
    }
}

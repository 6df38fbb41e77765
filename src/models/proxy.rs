//! Proxy model definitions
//!
//! Contains the core data structures for normalized proxy nodes.

/// Transport overlay carried by some protocols. Absence means plain TCP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    Ws {
        path: String,
        host: Option<String>,
    },
    H2 {
        path: String,
        host: Option<String>,
    },
    Grpc {
        service_name: String,
    },
}

/// Protocol-specific fields of a proxy node.
///
/// Each variant carries only the fields its protocol uses, so a field can
/// never be present-but-meaningless for a given kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyKind {
    Vmess {
        uuid: String,
        alter_id: u16,
        cipher: String,
        tls: bool,
    },
    Shadowsocks {
        cipher: String,
        password: String,
    },
    ShadowsocksR {
        cipher: String,
        password: String,
        protocol: String,
        obfs: String,
    },
    Trojan {
        password: String,
        sni: Option<String>,
        skip_cert_verify: bool,
    },
    Vless {
        uuid: String,
        cipher: Option<String>,
        tls: bool,
        sni: Option<String>,
    },
    Hysteria2 {
        password: String,
        sni: Option<String>,
        skip_cert_verify: bool,
    },
    Tuic {
        uuid: String,
        sni: Option<String>,
        skip_cert_verify: bool,
    },
}

impl ProxyKind {
    /// Short protocol tag used in identity keys and type statistics.
    pub fn tag(&self) -> &'static str {
        match self {
            ProxyKind::Vmess { .. } => "vmess",
            ProxyKind::Shadowsocks { .. } => "ss",
            ProxyKind::ShadowsocksR { .. } => "ssr",
            ProxyKind::Trojan { .. } => "trojan",
            ProxyKind::Vless { .. } => "vless",
            ProxyKind::Hysteria2 { .. } => "hysteria2",
            ProxyKind::Tuic { .. } => "tuic",
        }
    }

    /// Human-readable protocol name for log statistics.
    pub fn display_tag(&self) -> &'static str {
        match self {
            ProxyKind::Vmess { .. } => "VMess",
            ProxyKind::Shadowsocks { .. } => "SS",
            ProxyKind::ShadowsocksR { .. } => "SSR",
            ProxyKind::Trojan { .. } => "Trojan",
            ProxyKind::Vless { .. } => "VLESS",
            ProxyKind::Hysteria2 { .. } => "Hysteria2",
            ProxyKind::Tuic { .. } => "TUIC",
        }
    }
}

/// A normalized proxy node decoded from one subscription link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proxy {
    pub kind: ProxyKind,
    /// Remark carried by the link, if any. Once a collision suffix has been
    /// assigned this field holds the suffixed name and is never re-derived.
    pub name: Option<String>,
    pub server: String,
    pub port: u16,
    pub udp: bool,
    pub transport: Option<Transport>,
}

impl Proxy {
    pub fn new(kind: ProxyKind, name: Option<String>, server: &str, port: u16) -> Self {
        Proxy {
            kind,
            name,
            server: server.to_string(),
            port,
            udp: true,
            transport: None,
        }
    }

    /// The name shown in generated configs: the remark when present,
    /// otherwise `server:port`.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{}:{}", self.server, self.port),
        }
    }

    /// Stable identity used for deduplication: protocol tag, endpoint, and a
    /// protocol-appropriate authenticator.
    pub fn identity_key(&self) -> String {
        let auth = match &self.kind {
            ProxyKind::Vmess { uuid, .. }
            | ProxyKind::Vless { uuid, .. }
            | ProxyKind::Tuic { uuid, .. } => uuid.clone(),
            ProxyKind::Shadowsocks { cipher, password }
            | ProxyKind::ShadowsocksR {
                cipher, password, ..
            } => format!("{}:{}", cipher, password),
            ProxyKind::Trojan { password, .. } | ProxyKind::Hysteria2 { password, .. } => {
                password.clone()
            }
        };
        format!("{}:{}:{}:{}", self.kind.tag(), self.server, self.port, auth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_synthesized() {
        let node = Proxy::new(
            ProxyKind::Trojan {
                password: "pw".into(),
                sni: None,
                skip_cert_verify: false,
            },
            None,
            "example.com",
            443,
        );
        assert_eq!(node.display_name(), "example.com:443");
    }

    #[test]
    fn test_identity_key_ignores_name() {
        let mut a = Proxy::new(
            ProxyKind::Shadowsocks {
                cipher: "aes-128-gcm".into(),
                password: "k".into(),
            },
            Some("first".into()),
            "dup.example.com",
            443,
        );
        let b = Proxy {
            name: Some("second".into()),
            ..a.clone()
        };
        assert_eq!(a.identity_key(), b.identity_key());
        a.name = None;
        assert_eq!(a.identity_key(), b.identity_key());
    }

    #[test]
    fn test_identity_key_differs_by_auth() {
        let a = Proxy::new(
            ProxyKind::Vless {
                uuid: "u-1".into(),
                cipher: None,
                tls: false,
                sni: None,
            },
            None,
            "h",
            1,
        );
        let b = Proxy::new(
            ProxyKind::Vless {
                uuid: "u-2".into(),
                cipher: None,
                tls: false,
                sni: None,
            },
            None,
            "h",
            1,
        );
        assert_ne!(a.identity_key(), b.identity_key());
    }
}

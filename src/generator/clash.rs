//! Clash YAML artifact generation.
//!
//! The artifact is assembled from an externally supplied template head
//! (global options, DNS) and tail (proxy-groups and rules); the generated
//! `proxies:` block is spliced between them and every group-membership
//! placeholder in the tail is expanded to the surviving node names. A
//! built-in minimal config stands in whenever the template is unusable, so
//! a run never produces zero output because of a missing template.

use std::collections::HashMap;
use std::path::Path;

use log::warn;
use serde::Serialize;
use serde_yaml::Value;

use crate::models::{Proxy, ProxyKind, Transport};

/// List item in a template group's `proxies:` list that expands to the full
/// ordered list of surviving node names.
pub const PROXIES_PLACEHOLDER: &str = "__PROXIES__";

#[derive(Debug, Clone, Serialize)]
pub struct WsOpts {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct H2Opts {
    pub path: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub host: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GrpcOpts {
    #[serde(rename = "grpc-service-name")]
    pub grpc_service_name: String,
}

/// One entry of the Clash `proxies:` list.
#[derive(Debug, Clone, Serialize)]
pub struct ClashProxy {
    pub name: String,
    #[serde(rename = "type")]
    pub proxy_type: &'static str,
    pub server: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(rename = "alterId", skip_serializing_if = "Option::is_none")]
    pub alter_id: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cipher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obfs: Option<String>,
    pub udp: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sni: Option<String>,
    #[serde(rename = "skip-cert-verify", skip_serializing_if = "Option::is_none")]
    pub skip_cert_verify: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<&'static str>,
    #[serde(rename = "ws-opts", skip_serializing_if = "Option::is_none")]
    pub ws_opts: Option<WsOpts>,
    #[serde(rename = "h2-opts", skip_serializing_if = "Option::is_none")]
    pub h2_opts: Option<H2Opts>,
    #[serde(rename = "grpc-opts", skip_serializing_if = "Option::is_none")]
    pub grpc_opts: Option<GrpcOpts>,
}

impl From<&Proxy> for ClashProxy {
    fn from(node: &Proxy) -> Self {
        let mut out = ClashProxy {
            name: node.display_name(),
            proxy_type: "unknown",
            server: node.server.clone(),
            port: node.port,
            uuid: None,
            alter_id: None,
            cipher: None,
            password: None,
            protocol: None,
            obfs: None,
            udp: node.udp,
            tls: None,
            sni: None,
            skip_cert_verify: None,
            network: None,
            ws_opts: None,
            h2_opts: None,
            grpc_opts: None,
        };

        match &node.kind {
            ProxyKind::Vmess {
                uuid,
                alter_id,
                cipher,
                tls,
            } => {
                out.proxy_type = "vmess";
                out.uuid = Some(uuid.clone());
                out.alter_id = Some(*alter_id);
                out.cipher = Some(cipher.clone());
                out.tls = Some(*tls);
            }
            ProxyKind::Shadowsocks { cipher, password } => {
                out.proxy_type = "ss";
                out.cipher = Some(cipher.clone());
                out.password = Some(password.clone());
            }
            ProxyKind::ShadowsocksR {
                cipher,
                password,
                protocol,
                obfs,
            } => {
                out.proxy_type = "ssr";
                out.cipher = Some(cipher.clone());
                out.password = Some(password.clone());
                out.protocol = Some(protocol.clone());
                out.obfs = Some(obfs.clone());
            }
            ProxyKind::Trojan {
                password,
                sni,
                skip_cert_verify,
            } => {
                out.proxy_type = "trojan";
                out.password = Some(password.clone());
                out.tls = Some(true);
                out.sni = sni.clone();
                if *skip_cert_verify {
                    out.skip_cert_verify = Some(true);
                }
            }
            ProxyKind::Vless {
                uuid,
                cipher,
                tls,
                sni,
            } => {
                out.proxy_type = "vless";
                out.uuid = Some(uuid.clone());
                out.cipher = cipher.clone();
                if *tls {
                    out.tls = Some(true);
                }
                out.sni = sni.clone();
            }
            ProxyKind::Hysteria2 {
                password,
                sni,
                skip_cert_verify,
            } => {
                out.proxy_type = "hysteria2";
                out.password = Some(password.clone());
                out.sni = sni.clone();
                if *skip_cert_verify {
                    out.skip_cert_verify = Some(true);
                }
            }
            ProxyKind::Tuic {
                uuid,
                sni,
                skip_cert_verify,
            } => {
                out.proxy_type = "tuic";
                out.uuid = Some(uuid.clone());
                out.sni = sni.clone();
                if *skip_cert_verify {
                    out.skip_cert_verify = Some(true);
                }
            }
        }

        match &node.transport {
            Some(Transport::Ws { path, host }) => {
                out.network = Some("ws");
                out.ws_opts = Some(WsOpts {
                    path: path.clone(),
                    headers: host
                        .as_ref()
                        .map(|h| HashMap::from([("Host".to_string(), h.clone())])),
                });
            }
            Some(Transport::H2 { path, host }) => {
                out.network = Some("h2");
                out.h2_opts = Some(H2Opts {
                    path: path.clone(),
                    host: host.iter().cloned().collect(),
                });
            }
            Some(Transport::Grpc { service_name }) => {
                out.network = Some("grpc");
                out.grpc_opts = Some(GrpcOpts {
                    grpc_service_name: service_name.clone(),
                });
            }
            None => {}
        }
        out
    }
}

#[derive(Serialize)]
struct ProxiesBlock {
    proxies: Vec<ClashProxy>,
}

#[derive(Serialize)]
struct GroupsBlock {
    #[serde(rename = "proxy-groups")]
    proxy_groups: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct FallbackDns {
    enable: bool,
    nameserver: Vec<String>,
    fallback: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct FallbackGroup {
    name: String,
    #[serde(rename = "type")]
    group_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    interval: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tolerance: Option<u32>,
    proxies: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct FallbackConfig {
    port: u16,
    socks_port: u16,
    allow_lan: bool,
    mode: &'static str,
    log_level: &'static str,
    external_controller: &'static str,
    dns: FallbackDns,
    proxies: Vec<ClashProxy>,
    proxy_groups: Vec<FallbackGroup>,
    rules: Vec<&'static str>,
}

/// Reads the template pair; `None` when either file is missing or unreadable.
pub fn load_template(head: &Path, tail: &Path) -> Option<(String, String)> {
    let head = std::fs::read_to_string(head).ok()?;
    let tail = std::fs::read_to_string(tail).ok()?;
    Some((head, tail))
}

/// Renders the Clash artifact from the deduplicated node set.
pub fn render_clash(proxies: &[Proxy], names: &[String], template: Option<(String, String)>) -> String {
    let clash_proxies: Vec<ClashProxy> = proxies.iter().map(ClashProxy::from).collect();
    if let Some((head, tail)) = template {
        match splice_template(&head, &tail, &clash_proxies, names) {
            Ok(config) => return config,
            Err(e) => warn!("clash template rejected, using fallback config: {}", e),
        }
    }
    fallback_config(clash_proxies, names)
}

fn splice_template(
    head: &str,
    tail: &str,
    proxies: &[ClashProxy],
    names: &[String],
) -> Result<String, String> {
    let proxies_yaml = serde_yaml::to_string(&ProxiesBlock {
        proxies: proxies.to_vec(),
    })
    .map_err(|e| e.to_string())?;

    let mut tail_value: Value =
        serde_yaml::from_str(tail).map_err(|e| format!("invalid template tail: {}", e))?;
    expand_placeholders(&mut tail_value, names);

    let tail_yaml = match tail_value {
        Value::Mapping(_) => serde_yaml::to_string(&tail_value).map_err(|e| e.to_string())?,
        Value::Sequence(_) => serde_yaml::to_string(&GroupsBlock {
            proxy_groups: tail_value,
        })
        .map_err(|e| e.to_string())?,
        _ => return Err("template tail is neither a mapping nor a group list".to_string()),
    };

    Ok(format!(
        "{}\n{}{}",
        head.trim_end(),
        proxies_yaml,
        tail_yaml
    ))
}

/// Replaces every placeholder list item with the full ordered name list.
fn expand_placeholders(value: &mut Value, names: &[String]) {
    match value {
        Value::Mapping(map) => {
            for (_, v) in map.iter_mut() {
                expand_placeholders(v, names);
            }
        }
        Value::Sequence(items) => {
            let mut expanded = Vec::with_capacity(items.len());
            for mut item in items.drain(..) {
                if item.as_str() == Some(PROXIES_PLACEHOLDER) {
                    expanded.extend(names.iter().map(|n| Value::String(n.clone())));
                } else {
                    expand_placeholders(&mut item, names);
                    expanded.push(item);
                }
            }
            *items = expanded;
        }
        _ => {}
    }
}

/// Minimal built-in config used when no template is available.
fn fallback_config(proxies: Vec<ClashProxy>, names: &[String]) -> String {
    let mut select = vec!["Auto Select".to_string(), "DIRECT".to_string()];
    select.extend(names.iter().cloned());
    let mut fallthrough = vec![
        "Proxy Select".to_string(),
        "Direct".to_string(),
        "Auto Select".to_string(),
    ];
    fallthrough.extend(names.iter().cloned());

    let config = FallbackConfig {
        port: 7890,
        socks_port: 7891,
        allow_lan: true,
        mode: "Rule",
        log_level: "info",
        external_controller: ":9090",
        dns: FallbackDns {
            enable: true,
            nameserver: vec!["119.29.29.29".to_string(), "223.5.5.5".to_string()],
            fallback: vec!["8.8.8.8".to_string(), "8.8.4.4".to_string()],
        },
        proxies,
        proxy_groups: vec![
            FallbackGroup {
                name: "Proxy Select".to_string(),
                group_type: "select",
                url: None,
                interval: None,
                tolerance: None,
                proxies: select,
            },
            FallbackGroup {
                name: "Auto Select".to_string(),
                group_type: "url-test",
                url: Some("http://www.gstatic.com/generate_204"),
                interval: Some(300),
                tolerance: Some(50),
                proxies: names.to_vec(),
            },
            FallbackGroup {
                name: "Direct".to_string(),
                group_type: "select",
                url: None,
                interval: None,
                tolerance: None,
                proxies: vec![
                    "DIRECT".to_string(),
                    "Proxy Select".to_string(),
                    "Auto Select".to_string(),
                ],
            },
            FallbackGroup {
                name: "Block".to_string(),
                group_type: "select",
                url: None,
                interval: None,
                tolerance: None,
                proxies: vec!["REJECT".to_string(), "DIRECT".to_string()],
            },
            FallbackGroup {
                name: "Final".to_string(),
                group_type: "select",
                url: None,
                interval: None,
                tolerance: None,
                proxies: fallthrough,
            },
        ],
        rules: vec![
            "IP-CIDR,127.0.0.0/8,Direct,no-resolve",
            "IP-CIDR,172.16.0.0/12,Direct,no-resolve",
            "IP-CIDR,192.168.0.0/16,Direct,no-resolve",
            "GEOIP,CN,Direct",
            "MATCH,Final",
        ],
    };
    // Serialization of these plain structs cannot fail.
    serde_yaml::to_string(&config).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Proxy;

    fn sample_nodes() -> (Vec<Proxy>, Vec<String>) {
        let mut vmess = Proxy::new(
            ProxyKind::Vmess {
                uuid: "uuid-1".to_string(),
                alter_id: 0,
                cipher: "auto".to_string(),
                tls: true,
            },
            Some("node1".to_string()),
            "a.example.com",
            443,
        );
        vmess.transport = Some(Transport::Ws {
            path: "/sub".to_string(),
            host: Some("cdn.example.com".to_string()),
        });
        let trojan = Proxy::new(
            ProxyKind::Trojan {
                password: "pw".to_string(),
                sni: Some("x.com".to_string()),
                skip_cert_verify: true,
            },
            Some("t1".to_string()),
            "9.9.9.9",
            443,
        );
        let names = vec!["node1".to_string(), "t1".to_string()];
        (vec![vmess, trojan], names)
    }

    #[test]
    fn test_fallback_config_contains_nodes_and_groups() {
        let (nodes, names) = sample_nodes();
        let yaml = render_clash(&nodes, &names, None);
        let parsed: Value = serde_yaml::from_str(&yaml).expect("valid yaml");
        assert_eq!(parsed["proxies"].as_sequence().unwrap().len(), 2);
        assert_eq!(parsed["proxies"][0]["name"].as_str(), Some("node1"));
        assert_eq!(parsed["proxies"][0]["type"].as_str(), Some("vmess"));
        assert_eq!(
            parsed["proxies"][0]["ws-opts"]["headers"]["Host"].as_str(),
            Some("cdn.example.com")
        );
        assert_eq!(
            parsed["proxies"][1]["skip-cert-verify"].as_bool(),
            Some(true)
        );
        let groups = parsed["proxy-groups"].as_sequence().unwrap();
        assert_eq!(groups.len(), 5);
        let auto = &groups[1];
        assert_eq!(auto["type"].as_str(), Some("url-test"));
        assert_eq!(
            auto["proxies"].as_sequence().unwrap().len(),
            names.len()
        );
        assert_eq!(parsed["rules"].as_sequence().unwrap().last().unwrap().as_str(), Some("MATCH,Final"));
    }

    #[test]
    fn test_template_splice_expands_placeholder() {
        let (nodes, names) = sample_nodes();
        let head = "port: 7890\nmode: Rule\n";
        let tail = concat!(
            "proxy-groups:\n",
            "  - name: Select\n",
            "    type: select\n",
            "    proxies:\n",
            "      - DIRECT\n",
            "      - __PROXIES__\n",
            "rules:\n",
            "  - MATCH,Select\n",
        );
        let yaml = render_clash(
            &nodes,
            &names,
            Some((head.to_string(), tail.to_string())),
        );
        let parsed: Value = serde_yaml::from_str(&yaml).expect("valid yaml");
        assert_eq!(parsed["port"].as_u64(), Some(7890));
        assert_eq!(parsed["proxies"].as_sequence().unwrap().len(), 2);
        let members = parsed["proxy-groups"][0]["proxies"].as_sequence().unwrap();
        let member_names: Vec<_> = members.iter().filter_map(|v| v.as_str()).collect();
        assert_eq!(member_names, vec!["DIRECT", "node1", "t1"]);
    }

    #[test]
    fn test_bad_template_falls_back() {
        let (nodes, names) = sample_nodes();
        let yaml = render_clash(
            &nodes,
            &names,
            Some(("port: 1\n".to_string(), ": not yaml [".to_string())),
        );
        let parsed: Value = serde_yaml::from_str(&yaml).expect("fallback yaml");
        assert!(parsed["proxy-groups"].as_sequence().is_some());
    }

    #[test]
    fn test_bare_group_sequence_tail() {
        let (nodes, names) = sample_nodes();
        let tail = "- name: G\n  type: select\n  proxies:\n    - __PROXIES__\n";
        let yaml = render_clash(&nodes, &names, Some((String::new(), tail.to_string())));
        let parsed: Value = serde_yaml::from_str(&yaml).expect("valid yaml");
        let members = parsed["proxy-groups"][0]["proxies"].as_sequence().unwrap();
        assert_eq!(members.len(), 2);
    }
}

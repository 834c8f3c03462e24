use crate::daemon::schema::{Client, Inbound};
use crate::utils::encoding::percent_encode;
use serde::Serialize;

/// Everything a client app needs to connect as one user
#[derive(Debug, Clone, Serialize)]
pub struct ClientProfile {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub network: String,
    pub security: String,
    pub path: String,
    pub client: Client,
}

impl ClientProfile {
    /// Build a profile for `client` on `inbound`.
    ///
    /// `port` overrides the inbound's listening port (for deployments behind
    /// a reverse proxy). Returns `None` if neither is known.
    pub fn new(inbound: &Inbound, client: Client, host: &str, port: Option<u16>) -> Option<Self> {
        Some(Self {
            protocol: inbound.protocol.clone(),
            host: host.to_string(),
            port: port.or(inbound.port)?,
            network: inbound.network().to_string(),
            security: inbound.security().to_string(),
            path: inbound.ws_path().to_string(),
            client,
        })
    }

    /// `scheme://<token>@<host>:<port>?<query>#<label>`
    pub fn subscription_line(&self) -> String {
        format!(
            "{}://{}@{}:{}?encryption=none&security={}&type={}&path={}#{}",
            self.protocol,
            self.client.id,
            self.host,
            self.port,
            self.security,
            self.network,
            percent_encode(&self.path),
            percent_encode(&self.client.email),
        )
    }

    /// Clash/Hiddify core profile with a single proxy for this user
    pub fn clash_yaml(&self) -> Result<String, serde_yaml::Error> {
        let name = self.client.email.clone();
        let profile = ClashProfile {
            port: 7890,
            socks_port: 7891,
            allow_lan: true,
            mode: "rule",
            log_level: "info",
            external_controller: "127.0.0.1:9090",
            proxies: vec![ClashProxy {
                name: name.clone(),
                kind: self.protocol.clone(),
                server: self.host.clone(),
                port: self.port,
                uuid: self.client.id.clone(),
                network: self.network.clone(),
                tls: self.security == "tls",
                ws_opts: (self.network == "ws").then(|| WsOpts {
                    path: self.path.clone(),
                }),
            }],
            proxy_groups: vec![ClashGroup {
                name: "auto".to_string(),
                kind: "select".to_string(),
                proxies: vec![name],
            }],
            rules: vec!["MATCH,auto".to_string()],
            tun: ClashTun {
                enable: true,
                stack: "system",
                auto_route: true,
                auto_detect_interface: true,
            },
        };

        serde_yaml::to_string(&profile)
    }
}

/// Subscription file body: one link per client of the inbound
pub fn subscription_text(inbound: &Inbound, host: &str, port: Option<u16>) -> String {
    inbound
        .clients()
        .iter()
        .filter_map(|client| ClientProfile::new(inbound, client.clone(), host, port))
        .map(|profile| profile.subscription_line() + "\n")
        .collect()
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct ClashProfile {
    port: u16,
    socks_port: u16,
    allow_lan: bool,
    mode: &'static str,
    log_level: &'static str,
    external_controller: &'static str,
    proxies: Vec<ClashProxy>,
    proxy_groups: Vec<ClashGroup>,
    rules: Vec<String>,
    tun: ClashTun,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct ClashProxy {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    server: String,
    port: u16,
    uuid: String,
    network: String,
    tls: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    ws_opts: Option<WsOpts>,
}

#[derive(Serialize)]
struct WsOpts {
    path: String,
}

#[derive(Serialize)]
struct ClashGroup {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    proxies: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct ClashTun {
    enable: bool,
    stack: &'static str,
    auto_route: bool,
    auto_detect_interface: bool,
}

//! Typed view of the proxy daemon's JSON configuration.
//!
//! Only the parts we read or own are modelled. Everything else is carried
//! through `extra` maps untouched, so a template round-trips without losing
//! fields we don't know about.

use crate::models::user::User;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    pub inbounds: Vec<Inbound>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inbound {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<InboundSettings>,
    #[serde(
        rename = "streamSettings",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub stream_settings: Option<StreamSettings>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InboundSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clients: Option<Vec<Client>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<String>,
    #[serde(rename = "wsSettings", default, skip_serializing_if = "Option::is_none")]
    pub ws_settings: Option<WsSettings>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WsSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One entry of an inbound's client list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    /// Identity token
    pub id: String,
    /// Display label; the daemon also keys per-user stats on it
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Client {
    pub fn for_user(user: &User) -> Self {
        Self {
            id: user.uuid.clone(),
            email: user.email.clone(),
            level: Some(user.tariff_id),
            flow: None,
            extra: Map::new(),
        }
    }
}

impl Inbound {
    pub fn clients(&self) -> &[Client] {
        self.settings
            .as_ref()
            .and_then(|settings| settings.clients.as_deref())
            .unwrap_or(&[])
    }

    pub fn network(&self) -> &str {
        self.stream_settings
            .as_ref()
            .and_then(|s| s.network.as_deref())
            .unwrap_or("tcp")
    }

    pub fn security(&self) -> &str {
        self.stream_settings
            .as_ref()
            .and_then(|s| s.security.as_deref())
            .unwrap_or("none")
    }

    pub fn ws_path(&self) -> &str {
        self.stream_settings
            .as_ref()
            .and_then(|s| s.ws_settings.as_ref())
            .and_then(|ws| ws.path.as_deref())
            .unwrap_or("/")
    }

    fn matches(&self, tag: Option<&str>) -> bool {
        match tag {
            Some(tag) => self.tag.as_deref() == Some(tag),
            None => self.protocol == "vless",
        }
    }
}

impl ConfigDocument {
    pub fn parse(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn to_pretty_bytes(&self) -> serde_json::Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// The inbound whose client list we own: the one tagged `tag`, or the
    /// first `vless` inbound when no tag is configured.
    pub fn managed_inbound(&self, tag: Option<&str>) -> Option<&Inbound> {
        self.inbounds.iter().find(|inbound| inbound.matches(tag))
    }

    pub fn managed_inbound_mut(&mut self, tag: Option<&str>) -> Option<&mut Inbound> {
        self.inbounds.iter_mut().find(|inbound| inbound.matches(tag))
    }

    /// Replace the managed inbound's client list wholesale.
    /// Returns `false` if there is no managed inbound.
    pub fn set_clients(&mut self, tag: Option<&str>, clients: Vec<Client>) -> bool {
        match self.managed_inbound_mut(tag) {
            Some(inbound) => {
                inbound
                    .settings
                    .get_or_insert_with(InboundSettings::default)
                    .clients = Some(clients);
                true
            }
            None => false,
        }
    }
}

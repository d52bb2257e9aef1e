use crate::error::{MeshError, Result};
use peermesh_core::IceServerConfig;
use serde::{Deserialize, Serialize};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;

const ICE_SCHEMES: [&str; 4] = ["stun:", "stuns:", "turn:", "turns:"];

/// WebRTC settings applied to every peer connection the mesh opens.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransportConfig {
    pub ice_servers: Vec<IceServerConfig>,
    /// Label of the control data channel created by the offerer.
    pub channel_label: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig {
                urls: vec![
                    "stun:stun.l.google.com:19302".to_owned(),
                    "stun:stun1.l.google.com:19302".to_owned(),
                ],
                username: None,
                credential: None,
            }],
            channel_label: "control".to_owned(),
        }
    }
}

impl TransportConfig {
    /// Host candidates only. Enough for peers on the same machine or LAN.
    pub fn local() -> Self {
        Self {
            ice_servers: Vec::new(),
            ..Self::default()
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| MeshError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.channel_label.is_empty() {
            return Err(MeshError::InvalidConfig(
                "channel label cannot be empty".into(),
            ));
        }

        for server in &self.ice_servers {
            if server.urls.is_empty() {
                return Err(MeshError::InvalidConfig(
                    "ICE server entry has no URLs".into(),
                ));
            }

            for url in &server.urls {
                if !ICE_SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
                    return Err(MeshError::InvalidConfig(format!(
                        "unsupported ICE server URL '{url}'"
                    )));
                }

                let is_turn = url.starts_with("turn:") || url.starts_with("turns:");
                if is_turn && (server.username.is_none() || server.credential.is_none()) {
                    return Err(MeshError::InvalidConfig(format!(
                        "TURN server '{url}' requires username and credential"
                    )));
                }
            }
        }

        Ok(())
    }

    pub(crate) fn rtc_configuration(&self) -> RTCConfiguration {
        RTCConfiguration {
            ice_servers: self
                .ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        }
    }
}

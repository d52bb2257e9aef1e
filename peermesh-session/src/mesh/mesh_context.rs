use crate::error::{MeshError, Result};
use crate::session::OpenChannels;
use bytes::Bytes;
use futures::future::join_all;
use peermesh_core::{ControlMessage, FileChunker, FileInfo, PeerId};
use std::sync::Arc;
use tracing::{debug, error, warn};
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;

/// Send side of the data channel multiplexer.
///
/// Reads the shared map of open channels, so sending never waits on the mesh
/// loop. Every method reports failure through its return value.
#[derive(Clone)]
pub struct MeshContext {
    peers: OpenChannels,
}

impl MeshContext {
    pub(crate) fn new(peers: OpenChannels) -> Self {
        Self { peers }
    }

    /// The peer's control channel, if it is open right now.
    pub fn channel(&self, peer_id: &PeerId) -> Result<Arc<RTCDataChannel>> {
        self.peers
            .get(peer_id)
            .map(|entry| entry.value().clone())
            .filter(|channel| channel.ready_state() == RTCDataChannelState::Open)
            .ok_or_else(|| MeshError::ChannelUnavailable(peer_id.clone()))
    }

    /// `false` when the peer has no open channel or the write fails.
    pub async fn send(&self, peer_id: &PeerId, message: &ControlMessage) -> bool {
        let channel = match self.channel(peer_id) {
            Ok(channel) => channel,
            Err(e) => {
                debug!("{}, dropping {}", e, message.tag());
                return false;
            }
        };
        let json = match message.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize {} message: {}", message.tag(), e);
                return false;
            }
        };
        send_text(&channel, peer_id, json).await
    }

    pub async fn send_binary(&self, peer_id: &PeerId, data: Bytes) -> bool {
        let channel = match self.channel(peer_id) {
            Ok(channel) => channel,
            Err(e) => {
                debug!("{}, dropping {} bytes", e, data.len());
                return false;
            }
        };
        send_bytes(&channel, peer_id, &data).await
    }

    /// Announces the file with `file-info`, then streams it in fixed-size chunks.
    pub async fn send_file(
        &self,
        peer_id: &PeerId,
        name: &str,
        mime_type: &str,
        data: Bytes,
    ) -> bool {
        let info = FileInfo::new(name, data.len() as u64, mime_type);
        if !self.send(peer_id, &ControlMessage::FileInfo(info)).await {
            return false;
        }

        let Ok(channel) = self.channel(peer_id) else {
            return false;
        };
        for chunk in FileChunker::new(data) {
            if !send_bytes(&channel, peer_id, &chunk).await {
                warn!("File transfer to {} interrupted", peer_id);
                return false;
            }
        }
        true
    }

    /// Sends to every peer whose channel is open right now. Returns the number reached.
    pub async fn broadcast(&self, message: &ControlMessage) -> usize {
        let json = match message.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize {} message: {}", message.tag(), e);
                return 0;
            }
        };

        // Collect first so no map guard is held across an await.
        let targets: Vec<(PeerId, Arc<RTCDataChannel>)> = self
            .peers
            .iter()
            .filter(|entry| entry.value().ready_state() == RTCDataChannelState::Open)
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let sends = targets
            .iter()
            .map(|(peer_id, channel)| send_text(channel, peer_id, json.clone()));
        join_all(sends).await.into_iter().filter(|ok| *ok).count()
    }

    pub fn open_peers(&self) -> Vec<PeerId> {
        self.peers
            .iter()
            .filter(|entry| entry.value().ready_state() == RTCDataChannelState::Open)
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn is_open(&self, peer_id: &PeerId) -> bool {
        self.channel(peer_id).is_ok()
    }
}

async fn send_text(channel: &RTCDataChannel, peer_id: &PeerId, text: String) -> bool {
    match channel.send_text(text).await {
        Ok(_) => true,
        Err(e) => {
            error!("Failed to send message to {}: {}", peer_id, e);
            false
        }
    }
}

async fn send_bytes(channel: &RTCDataChannel, peer_id: &PeerId, data: &Bytes) -> bool {
    match channel.send(data).await {
        Ok(_) => true,
        Err(e) => {
            error!("Failed to send {} bytes to {}: {}", data.len(), peer_id, e);
            false
        }
    }
}

use crate::error::{MeshError, Result};
use crate::session::connection_state::ConnectionState;
use crate::session::peer_session::{PeerSession, Role};
use crate::transport::{ConnectionWrapper, LocalMediaSource, TransportConfig, TransportEvent};
use dashmap::DashMap;
use peermesh_core::PeerId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use webrtc::data_channel::RTCDataChannel;

pub(crate) type OpenChannels = Arc<DashMap<PeerId, Arc<RTCDataChannel>>>;

/// The single owner of every peer session.
///
/// Open control channels are mirrored into a shared map so senders can reach
/// them without going through the mesh loop. The mirror only ever holds
/// channels of live sessions.
pub struct SessionRegistry {
    sessions: HashMap<PeerId, PeerSession>,
    /// Shared with `MeshContext`.
    open_channels: OpenChannels,
    /// Never reused, so stale callbacks can be told apart.
    next_connection_id: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            open_channels: Arc::new(DashMap::new()),
            next_connection_id: 1,
        }
    }

    pub(crate) fn open_channels(&self) -> OpenChannels {
        Arc::clone(&self.open_channels)
    }

    /// Builds a fresh connection for `peer_id` and starts it `Connecting`.
    ///
    /// Fails with `AlreadyExists` while a live session is present. A leftover
    /// terminal session is closed and replaced.
    pub async fn create_session(
        &mut self,
        peer_id: PeerId,
        role: Role,
        config: &TransportConfig,
        media: Option<&Arc<dyn LocalMediaSource>>,
        event_tx: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<&mut PeerSession> {
        if let Some(existing) = self.sessions.get(&peer_id) {
            if !existing.state().is_terminal() {
                return Err(MeshError::AlreadyExists(peer_id));
            }
            self.remove(&peer_id).await;
        }

        let connection_id = self.next_connection_id;
        self.next_connection_id += 1;

        let transport =
            ConnectionWrapper::new(peer_id.clone(), connection_id, config, media, event_tx)
                .await
                .map_err(|e| MeshError::transport(&peer_id, e))?;

        let mut session = PeerSession::new(role, transport);
        session.transition(ConnectionState::Connecting);
        info!(
            "Session created for {} as {:?} (connection {})",
            peer_id, role, connection_id
        );

        Ok(self.sessions.entry(peer_id).or_insert(session))
    }

    pub fn get(&self, peer_id: &PeerId) -> Option<&PeerSession> {
        self.sessions.get(peer_id)
    }

    pub fn get_mut(&mut self, peer_id: &PeerId) -> Option<&mut PeerSession> {
        self.sessions.get_mut(peer_id)
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.sessions.contains_key(peer_id)
    }

    /// Whether `connection_id` belongs to the session currently registered for the peer.
    pub fn is_current(&self, peer_id: &PeerId, connection_id: u64) -> bool {
        self.sessions
            .get(peer_id)
            .is_some_and(|s| s.connection_id() == connection_id)
    }

    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.sessions.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Applies a lifecycle transition and keeps the channel mirror in step.
    pub fn transition(&mut self, peer_id: &PeerId, next: ConnectionState) -> bool {
        let Some(session) = self.sessions.get_mut(peer_id) else {
            return false;
        };
        let changed = session.transition(next);
        if session.channel().is_none() {
            self.open_channels.remove(peer_id);
        }
        changed
    }

    /// Publishes an open control channel for sending.
    pub fn attach_open_channel(
        &mut self,
        peer_id: &PeerId,
        connection_id: u64,
        channel: Arc<RTCDataChannel>,
    ) -> bool {
        let Some(session) = self.sessions.get_mut(peer_id) else {
            return false;
        };
        if session.connection_id() != connection_id
            || !session.attach_channel(Arc::clone(&channel))
        {
            return false;
        }
        self.open_channels.insert(peer_id.clone(), channel);
        true
    }

    /// Closes and forgets the session. Returns whether one was present.
    pub async fn remove(&mut self, peer_id: &PeerId) -> bool {
        self.open_channels.remove(peer_id);
        let Some(mut session) = self.sessions.remove(peer_id) else {
            return false;
        };
        session.close().await;
        true
    }

    /// Closes every session. Returns the ids that were removed.
    pub async fn remove_all(&mut self) -> Vec<PeerId> {
        self.open_channels.clear();
        let mut removed = Vec::with_capacity(self.sessions.len());
        for (peer_id, mut session) in self.sessions.drain() {
            session.close().await;
            removed.push(peer_id);
        }
        removed
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

use crate::error::{MeshError, Result};
use crate::session::connection_state::ConnectionState;
use crate::session::ice_queue::{Admission, IceCandidateQueue};
use crate::transport::ConnectionWrapper;
use peermesh_core::{ConnectionStats, IceCandidate, PeerId};
use std::sync::Arc;
use tracing::{debug, info, warn};
use webrtc::data_channel::RTCDataChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Created the offer and the control channel.
    Offerer,
    Answerer,
}

/// Negotiation state of one remote participant.
///
/// Owned by the registry and only mutated from the mesh loop, so the
/// description and candidate steps for one peer never interleave.
pub struct PeerSession {
    peer_id: PeerId,
    /// Fixed at creation; decides who opens the channel.
    role: Role,
    state: ConnectionState,
    /// Set once our offer or answer is applied locally.
    local_description_set: bool,
    /// Remote candidates waiting for the remote description. Also tracks
    /// whether that description is set.
    candidates: IceCandidateQueue,
    /// Control channel. Only present while Connecting or Connected.
    channel: Option<Arc<RTCDataChannel>>,
    transport: ConnectionWrapper,
}

impl PeerSession {
    pub(crate) fn new(role: Role, transport: ConnectionWrapper) -> Self {
        Self {
            peer_id: transport.peer_id.clone(),
            role,
            state: ConnectionState::Idle,
            local_description_set: false,
            candidates: IceCandidateQueue::new(),
            channel: None,
            transport,
        }
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn connection_id(&self) -> u64 {
        self.transport.connection_id
    }

    pub fn local_description_set(&self) -> bool {
        self.local_description_set
    }

    pub fn remote_description_set(&self) -> bool {
        self.candidates.remote_description_set()
    }

    pub fn pending_candidates(&self) -> usize {
        self.candidates.len()
    }

    pub fn channel(&self) -> Option<&Arc<RTCDataChannel>> {
        self.channel.as_ref()
    }

    /// Moves to `next` if the lifecycle allows it. Leaving the live states
    /// drops the channel handle.
    pub fn transition(&mut self, next: ConnectionState) -> bool {
        if !self.state.can_transition_to(next) {
            debug!(
                "Ignoring {} -> {} for {}",
                self.state, next, self.peer_id
            );
            return false;
        }

        info!("Session {}: {} -> {}", self.peer_id, self.state, next);
        self.state = next;
        if !matches!(next, ConnectionState::Connecting | ConnectionState::Connected) {
            self.channel = None;
        }
        true
    }

    /// Creates the control channel. Offerer only, before the offer is made.
    pub async fn open_channel(&mut self, label: &str) -> Result<()> {
        if self.role != Role::Offerer || self.state != ConnectionState::Connecting {
            return Err(MeshError::conflict(
                &self.peer_id,
                "control channel is created by the offerer while connecting",
            ));
        }

        let channel = self
            .transport
            .create_data_channel(label)
            .await
            .map_err(|e| MeshError::transport(&self.peer_id, e))?;
        self.channel = Some(channel);
        Ok(())
    }

    pub async fn create_offer(&mut self) -> Result<String> {
        if self.role != Role::Offerer || self.local_description_set {
            return Err(MeshError::conflict(&self.peer_id, "offer already created"));
        }

        let sdp = self
            .transport
            .create_offer()
            .await
            .map_err(|e| MeshError::transport(&self.peer_id, e))?;
        self.local_description_set = true;
        Ok(sdp)
    }

    /// Applies a remote offer, releases queued candidates and returns the answer.
    pub async fn accept_offer(&mut self, sdp: String) -> Result<String> {
        if self.role != Role::Answerer || self.remote_description_set() {
            return Err(MeshError::conflict(
                &self.peer_id,
                "offer arrived after negotiation started",
            ));
        }

        self.transport
            .set_remote_offer(sdp)
            .await
            .map_err(|e| MeshError::transport(&self.peer_id, e))?;
        self.drain_candidates().await;

        let answer = self
            .transport
            .create_answer()
            .await
            .map_err(|e| MeshError::transport(&self.peer_id, e))?;
        self.local_description_set = true;
        Ok(answer)
    }

    pub async fn accept_answer(&mut self, sdp: String) -> Result<()> {
        if self.role != Role::Offerer || !self.local_description_set {
            return Err(MeshError::conflict(
                &self.peer_id,
                "answer without a pending offer",
            ));
        }
        if self.remote_description_set() {
            return Err(MeshError::conflict(&self.peer_id, "duplicate answer"));
        }

        self.transport
            .set_remote_answer(sdp)
            .await
            .map_err(|e| MeshError::transport(&self.peer_id, e))?;
        self.drain_candidates().await;
        Ok(())
    }

    /// Applies the candidate now, or queues it until the remote description is set.
    pub async fn add_ice_candidate(&mut self, candidate: IceCandidate) -> Result<()> {
        match self.candidates.admit(candidate) {
            Admission::ApplyNow(candidate) => self
                .transport
                .add_ice_candidate(candidate)
                .await
                .map_err(|e| MeshError::transport(&self.peer_id, e)),
            Admission::Queued => {
                debug!(
                    "Queued ICE candidate for {} ({} pending)",
                    self.peer_id,
                    self.candidates.len()
                );
                Ok(())
            }
        }
    }

    async fn drain_candidates(&mut self) {
        let queued = self.candidates.mark_remote_description_set();
        if !queued.is_empty() {
            debug!(
                "Applying {} queued ICE candidates for {}",
                queued.len(),
                self.peer_id
            );
        }

        for candidate in queued {
            if let Err(e) = self.transport.add_ice_candidate(candidate).await {
                warn!("Queued ICE candidate rejected for {}: {:#}", self.peer_id, e);
            }
        }
    }

    /// Records the open control channel. Refused once the session has left the live states.
    pub fn attach_channel(&mut self, channel: Arc<RTCDataChannel>) -> bool {
        if !matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            return false;
        }
        self.channel = Some(channel);
        true
    }

    pub async fn stats(&self) -> ConnectionStats {
        self.transport.stats().await
    }

    /// Best-effort teardown. Close errors are logged and swallowed.
    pub async fn close(&mut self) {
        let channel = self.channel.take();
        self.transition(ConnectionState::Closed);

        if let Some(channel) = channel
            && let Err(e) = channel.close().await
        {
            debug!("Closing data channel to {} failed: {}", self.peer_id, e);
        }
        if let Err(e) = self.transport.close().await {
            debug!("Closing connection to {} failed: {:#}", self.peer_id, e);
        }
    }
}

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::dispatch::{EventDispatcher, PeerEvent};
use crate::error::{MeshError, Result};
use crate::mesh::mesh_command::MeshCommand;
use crate::session::{ConnectionState, Role, SessionRegistry};
use crate::signaling::SignalingOutput;
use crate::transport::{LocalMediaSource, TransportConfig, TransportEvent};
use peermesh_core::{ControlMessage, IceCandidate, IceServerConfig, PeerId, Signal, SignalMessage};

/// The mesh actor.
///
/// Owns the session registry and processes commands and transport events one
/// at a time, so operations on the same peer never interleave.
pub(crate) struct Mesh {
    /// Our id on the bus. Replaced by `welcome`.
    local_id: PeerId,
    /// Publishes `local_id` to every handle.
    identity: watch::Sender<PeerId>,
    /// Every live session, keyed by remote peer.
    registry: SessionRegistry,
    /// Listener lists shared with the handles.
    dispatcher: EventDispatcher,
    /// Outbound side of the signaling bus.
    signaling: Arc<dyn SignalingOutput>,
    /// Used for every connection created from now on.
    config: TransportConfig,
    /// Tracks attached to each new connection.
    media: Option<Arc<dyn LocalMediaSource>>,
    /// Requests from handles and the signal pump.
    command_rx: mpsc::Receiver<MeshCommand>,
    /// Callbacks of every peer connection, tagged by connection id.
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    /// Cloned into every connection's callbacks.
    transport_tx: mpsc::UnboundedSender<TransportEvent>,
}

impl Mesh {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        local_id: PeerId,
        identity: watch::Sender<PeerId>,
        registry: SessionRegistry,
        dispatcher: EventDispatcher,
        signaling: Arc<dyn SignalingOutput>,
        config: TransportConfig,
        media: Option<Arc<dyn LocalMediaSource>>,
        command_rx: mpsc::Receiver<MeshCommand>,
    ) -> Self {
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();

        Self {
            local_id,
            identity,
            registry,
            dispatcher,
            signaling,
            config,
            media,
            command_rx,
            transport_rx,
            transport_tx,
        }
    }

    /// Runs until every handle is dropped, then closes all sessions.
    pub(crate) async fn run(mut self) {
        info!("Mesh loop started for {}", self.local_id);

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(c) => self.handle_command(c).await,
                        None => {
                            info!("Command channel closed. Shutting down mesh.");
                            break;
                        }
                    }
                }

                evt = self.transport_rx.recv() => {
                    match evt {
                        Some(e) => self.handle_transport_event(e).await,
                        None => {
                            // Unreachable while we hold transport_tx.
                            warn!("Transport channel closed unexpectedly");
                            break;
                        }
                    }
                }
            }
        }

        self.registry.remove_all().await;
        info!("Mesh loop finished for {}", self.local_id);
    }

    async fn handle_command(&mut self, cmd: MeshCommand) {
        match cmd {
            MeshCommand::Join => {
                info!("{} joining the signaling bus", self.local_id);
                self.signaling
                    .broadcast(Signal::Join {
                        peer_id: self.local_id.clone(),
                    })
                    .await;
            }

            MeshCommand::Connect { peer_id } => self.connect_to(peer_id).await,

            MeshCommand::Signal(message) => self.handle_signal(message).await,

            MeshCommand::RemovePeer { peer_id } => self.remove_peer_with_notify(&peer_id).await,

            MeshCommand::Leave { done } => {
                self.signaling
                    .broadcast(Signal::Leave {
                        peer_id: self.local_id.clone(),
                    })
                    .await;

                let removed = self.registry.remove_all().await;
                for peer_id in &removed {
                    self.notify_removed(peer_id);
                }
                info!("{} left the mesh ({} sessions closed)", self.local_id, removed.len());
                let _ = done.send(removed);
            }

            MeshCommand::Stats { peer_id, reply } => {
                let stats = match self.registry.get(&peer_id) {
                    Some(session) => Ok(session.stats().await),
                    None => Err(MeshError::UnknownPeer(peer_id)),
                };
                let _ = reply.send(stats);
            }

            MeshCommand::State { peer_id, reply } => {
                let _ = reply.send(self.registry.get(&peer_id).map(|s| s.state()));
            }

            MeshCommand::Peers { reply } => {
                let _ = reply.send(self.registry.peer_ids());
            }
        }
    }

    async fn handle_signal(&mut self, message: SignalMessage) {
        let SignalMessage { from, to, signal } = message;

        let signal = match signal {
            Signal::Welcome { peer_id } => {
                // The relay addresses `welcome` to the id it is assigning.
                if to.as_ref().is_some_and(|to| *to != self.local_id && *to != peer_id) {
                    warn!("Ignoring welcome addressed to {:?} from {}", to, from);
                    return;
                }
                info!("Signaling bus assigned id {}", peer_id);
                self.local_id = peer_id.clone();
                self.identity.send_replace(peer_id);
                return;
            }
            Signal::IceConfig { ice_servers } => {
                if to.as_ref().is_some_and(|to| *to != self.local_id) {
                    warn!("Ignoring ice-config addressed to {:?} from {}", to, from);
                    return;
                }
                self.apply_ice_config(ice_servers);
                return;
            }
            other => other,
        };

        if from == self.local_id {
            debug!("Ignoring own {} echoed by the bus", signal.kind());
            return;
        }
        if let Some(to) = &to
            && *to != self.local_id
        {
            debug!("Ignoring {} addressed to {}", signal.kind(), to);
            return;
        }

        debug!("Signal {} from {}", signal.kind(), from);
        match signal {
            Signal::Join { .. } => self.handle_join(from).await,
            Signal::Leave { .. } => self.remove_peer_with_notify(&from).await,
            Signal::Offer { sdp } => self.handle_offer(from, sdp).await,
            Signal::Answer { sdp } => self.handle_answer(from, sdp).await,
            Signal::IceCandidate(candidate) => self.handle_remote_candidate(from, candidate).await,
            Signal::Welcome { .. } | Signal::IceConfig { .. } => {}
        }
    }

    fn apply_ice_config(&mut self, ice_servers: Vec<IceServerConfig>) {
        let candidate = TransportConfig {
            ice_servers,
            ..self.config.clone()
        };
        match candidate.validate() {
            Ok(()) => {
                info!(
                    "Using {} ICE server entries from the signaling bus",
                    candidate.ice_servers.len()
                );
                self.config = candidate;
            }
            Err(e) => warn!("Ignoring ICE configuration from the bus: {}", e),
        }
    }

    /// A join from a peer we are still connected to means it restarted.
    async fn handle_join(&mut self, from: PeerId) {
        let connected = self
            .registry
            .get(&from)
            .is_some_and(|s| s.state() == ConnectionState::Connected);
        if connected {
            info!("{} rejoined; replacing its previous session", from);
            self.remove_peer_with_notify(&from).await;
        }
        self.connect_to(from).await;
    }

    /// Offerer path. An existing session for the peer makes this a no-op.
    async fn connect_to(&mut self, peer_id: PeerId) {
        if peer_id == self.local_id {
            return;
        }
        if let Some(existing) = self.registry.get(&peer_id) {
            if existing.state() != ConnectionState::Connecting {
                warn!("{}", MeshError::AlreadyExists(peer_id));
            }
            return;
        }

        let result = self.start_offer(&peer_id).await;
        if let Err(e) = result {
            self.negotiation_failed(&peer_id, e).await;
        }
    }

    async fn start_offer(&mut self, peer_id: &PeerId) -> Result<()> {
        let session = self
            .registry
            .create_session(
                peer_id.clone(),
                Role::Offerer,
                &self.config,
                self.media.as_ref(),
                self.transport_tx.clone(),
            )
            .await?;
        session.open_channel(&self.config.channel_label).await?;
        let sdp = session.create_offer().await?;

        self.emit(PeerEvent::ConnectionStateChange {
            peer_id: peer_id.clone(),
            state: ConnectionState::Connecting,
        });
        self.signaling
            .send(peer_id.clone(), Signal::Offer { sdp })
            .await;
        Ok(())
    }

    /// Answerer path.
    async fn handle_offer(&mut self, from: PeerId, sdp: String) {
        if let Some(existing) = self.registry.get(&from) {
            let glare = existing.role() == Role::Offerer
                && existing.state() == ConnectionState::Connecting
                && !existing.remote_description_set();
            let state = existing.state();

            if glare && self.local_id > from {
                // Both sides offered at once; the higher id yields and answers.
                info!("Offer collision with {}; answering instead", from);
                self.registry.remove(&from).await;
            } else if state == ConnectionState::Connected {
                // A fresh offer over a live link means the remote side started over.
                info!("New offer from connected peer {}; replacing its session", from);
                self.remove_peer_with_notify(&from).await;
            } else if !state.is_terminal() {
                warn!(
                    "{}",
                    MeshError::conflict(&from, "offer for an already negotiating session")
                );
                return;
            }
        }

        let result = self.answer_offer(&from, sdp).await;
        if let Err(e) = result {
            self.negotiation_failed(&from, e).await;
        }
    }

    async fn answer_offer(&mut self, from: &PeerId, sdp: String) -> Result<()> {
        let session = self
            .registry
            .create_session(
                from.clone(),
                Role::Answerer,
                &self.config,
                self.media.as_ref(),
                self.transport_tx.clone(),
            )
            .await?;
        let answer = session.accept_offer(sdp).await?;

        self.emit(PeerEvent::ConnectionStateChange {
            peer_id: from.clone(),
            state: ConnectionState::Connecting,
        });
        self.signaling
            .send(from.clone(), Signal::Answer { sdp: answer })
            .await;
        Ok(())
    }

    async fn handle_answer(&mut self, from: PeerId, sdp: String) {
        let Some(session) = self.registry.get_mut(&from) else {
            warn!("Dropping answer: {}", MeshError::UnknownPeer(from));
            return;
        };

        let result = session.accept_answer(sdp).await;
        if let Err(e) = result {
            self.negotiation_failed(&from, e).await;
        }
    }

    async fn handle_remote_candidate(&mut self, from: PeerId, candidate: IceCandidate) {
        let Some(session) = self.registry.get_mut(&from) else {
            warn!("Dropping ICE candidate: {}", MeshError::UnknownPeer(from));
            return;
        };

        let result = session.add_ice_candidate(candidate).await;
        if let Err(e) = result {
            warn!("ICE candidate from {} not applied: {}", from, e);
        }
    }

    /// Stale conflicts are ignored; a broken transport tears the session down.
    async fn negotiation_failed(&mut self, peer_id: &PeerId, err: MeshError) {
        if err.is_fatal_to_session() {
            error!("{}", err);
            self.fail_session(peer_id, ConnectionState::Failed).await;
        } else {
            warn!("{}", err);
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        if !self
            .registry
            .is_current(event.peer_id(), event.connection_id())
        {
            debug!(
                "Dropping stale transport event for {} (connection {})",
                event.peer_id(),
                event.connection_id()
            );
            return;
        }

        match event {
            TransportEvent::CandidateGenerated {
                peer_id, candidate, ..
            } => {
                self.emit(PeerEvent::IceCandidate {
                    peer_id: peer_id.clone(),
                    candidate: candidate.clone(),
                });
                self.signaling
                    .send(peer_id, Signal::IceCandidate(candidate))
                    .await;
            }

            TransportEvent::StateChanged { peer_id, state, .. } => {
                let Some(next) = ConnectionState::from_transport(state) else {
                    return;
                };
                match next {
                    ConnectionState::Connected => {
                        if self.registry.transition(&peer_id, next) {
                            info!("Peer {} connected", peer_id);
                            self.emit(PeerEvent::ConnectionStateChange {
                                peer_id,
                                state: next,
                            });
                        }
                    }
                    ConnectionState::Disconnected
                    | ConnectionState::Failed
                    | ConnectionState::Closed => {
                        warn!("Transport for {} reported {}", peer_id, next);
                        self.fail_session(&peer_id, next).await;
                    }
                    ConnectionState::Idle | ConnectionState::Connecting => {}
                }
            }

            TransportEvent::DataChannelOpen {
                peer_id,
                connection_id,
                channel,
            } => {
                if self
                    .registry
                    .attach_open_channel(&peer_id, connection_id, channel)
                {
                    info!("Control channel to {} ready", peer_id);
                } else {
                    debug!("Channel to {} opened after the session ended", peer_id);
                }
            }

            TransportEvent::Message { peer_id, data, .. } => {
                let event = match ControlMessage::parse(&data) {
                    Some(message) => {
                        debug!("{} message from {}", message.tag(), peer_id);
                        PeerEvent::DataChannelMessage { peer_id, message }
                    }
                    None => PeerEvent::DataChannelBinary { peer_id, data },
                };
                self.emit(event);
            }

            TransportEvent::TrackReceived { peer_id, track, .. } => {
                self.emit(PeerEvent::RemoteTrack {
                    peer_id,
                    stream_id: track.stream_id(),
                    track,
                });
            }
        }
    }

    /// Records the terminal state, then evicts the session.
    async fn fail_session(&mut self, peer_id: &PeerId, state: ConnectionState) {
        // Closed is reported by the removal itself.
        if self.registry.transition(peer_id, state) && state != ConnectionState::Closed {
            self.emit(PeerEvent::ConnectionStateChange {
                peer_id: peer_id.clone(),
                state,
            });
        }
        self.remove_peer_with_notify(peer_id).await;
    }

    /// Closes and evicts the session. Emits `peerDisconnected` once per session.
    async fn remove_peer_with_notify(&mut self, peer_id: &PeerId) {
        if !self.registry.remove(peer_id).await {
            debug!("No session to remove for {}", peer_id);
            return;
        }
        self.notify_removed(peer_id);
    }

    fn notify_removed(&self, peer_id: &PeerId) {
        info!("Peer {} removed", peer_id);
        self.emit(PeerEvent::ConnectionStateChange {
            peer_id: peer_id.clone(),
            state: ConnectionState::Closed,
        });
        self.emit(PeerEvent::PeerDisconnected {
            peer_id: peer_id.clone(),
        });
    }

    fn emit(&self, event: PeerEvent) {
        self.dispatcher.emit(&event);
    }
}

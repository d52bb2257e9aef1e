use crate::dispatch::{EventDispatcher, EventKind, PeerEvent};
use crate::error::{MeshError, Result};
use crate::mesh::mesh::Mesh;
use crate::mesh::mesh_command::MeshCommand;
use crate::mesh::mesh_context::MeshContext;
use crate::session::{ConnectionState, SessionRegistry};
use crate::signaling::SignalingOutput;
use crate::transport::{LocalMediaSource, TransportConfig};
use bytes::Bytes;
use peermesh_core::{ConnectionStats, ControlMessage, PeerId, SignalMessage};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::debug;

const COMMAND_BUFFER: usize = 256;

/// Configures and starts a mesh session.
pub struct MeshBuilder {
    local_id: PeerId,
    config: TransportConfig,
    media: Option<Arc<dyn LocalMediaSource>>,
    dispatcher: EventDispatcher,
}

impl MeshBuilder {
    pub fn new(local_id: PeerId) -> Self {
        Self {
            local_id,
            config: TransportConfig::default(),
            media: None,
            dispatcher: EventDispatcher::new(),
        }
    }

    pub fn config(mut self, config: TransportConfig) -> Self {
        self.config = config;
        self
    }

    /// Tracks from `source` are attached to every connection the mesh creates.
    pub fn media(mut self, source: Arc<dyn LocalMediaSource>) -> Self {
        self.media = Some(source);
        self
    }

    /// Listeners registered here see every event from the first one on.
    pub fn on<F>(self, kind: EventKind, handler: F) -> Self
    where
        F: Fn(&PeerEvent) + Send + Sync + 'static,
    {
        self.dispatcher.on(kind, handler);
        self
    }

    /// Validates the configuration and spawns the mesh loop on the current runtime.
    pub fn spawn(self, signaling: Arc<dyn SignalingOutput>) -> Result<MeshHandle> {
        self.config.validate()?;

        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (identity_tx, identity) = watch::channel(self.local_id.clone());
        let registry = SessionRegistry::new();
        let context = MeshContext::new(registry.open_channels());

        let mesh = Mesh::new(
            self.local_id,
            identity_tx,
            registry,
            self.dispatcher.clone(),
            signaling,
            self.config,
            self.media,
            command_rx,
        );
        tokio::spawn(async move {
            mesh.run().await;
        });

        Ok(MeshHandle {
            identity,
            command_tx,
            context,
            dispatcher: self.dispatcher,
        })
    }
}

/// Cloneable handle on a running mesh. Dropping the last one shuts the mesh down.
#[derive(Clone)]
pub struct MeshHandle {
    /// Follows the id the mesh currently answers to.
    identity: watch::Receiver<PeerId>,
    command_tx: mpsc::Sender<MeshCommand>,
    context: MeshContext,
    dispatcher: EventDispatcher,
}

impl MeshHandle {
    /// The provisional id given to the builder until the bus sends `welcome`.
    pub fn local_id(&self) -> PeerId {
        self.identity.borrow().clone()
    }

    async fn command(&self, cmd: MeshCommand) -> Result<()> {
        self.command_tx
            .send(cmd)
            .await
            .map_err(|_| MeshError::Shutdown)
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> MeshCommand) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.command(build(reply)).await?;
        rx.await.map_err(|_| MeshError::Shutdown)
    }

    /// Broadcasts `join`; peers already on the bus answer with offers.
    pub async fn join(&self) -> Result<()> {
        self.command(MeshCommand::Join).await
    }

    /// Opens a connection to `peer_id` as the offerer.
    pub async fn create_peer_connection(&self, peer_id: PeerId) -> Result<()> {
        self.command(MeshCommand::Connect { peer_id }).await
    }

    /// Feeds one envelope from the signaling bus into the mesh.
    pub async fn handle_signal(&self, message: SignalMessage) -> Result<()> {
        self.command(MeshCommand::Signal(message)).await
    }

    /// Pumps every envelope from `signals` into the mesh until either side closes.
    pub fn forward_signals(
        &self,
        mut signals: mpsc::UnboundedReceiver<SignalMessage>,
    ) -> JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            while let Some(message) = signals.recv().await {
                if handle.handle_signal(message).await.is_err() {
                    break;
                }
            }
            debug!("Signal pump for {} finished", handle.local_id());
        })
    }

    pub async fn send(&self, peer_id: &PeerId, message: &ControlMessage) -> bool {
        self.context.send(peer_id, message).await
    }

    pub async fn send_binary(&self, peer_id: &PeerId, data: Bytes) -> bool {
        self.context.send_binary(peer_id, data).await
    }

    pub async fn send_file(&self, peer_id: &PeerId, name: &str, mime_type: &str, data: Bytes) -> bool {
        self.context.send_file(peer_id, name, mime_type, data).await
    }

    pub async fn broadcast(&self, message: &ControlMessage) -> usize {
        self.context.broadcast(message).await
    }

    pub async fn remove_peer(&self, peer_id: PeerId) -> Result<()> {
        self.command(MeshCommand::RemovePeer { peer_id }).await
    }

    /// Broadcasts `leave` and closes every session. Returns the peers that were dropped.
    pub async fn leave(&self) -> Result<Vec<PeerId>> {
        self.request(|done| MeshCommand::Leave { done }).await
    }

    pub async fn stats(&self, peer_id: PeerId) -> Result<ConnectionStats> {
        self.request(|reply| MeshCommand::Stats { peer_id, reply })
            .await?
    }

    pub async fn state(&self, peer_id: PeerId) -> Result<Option<ConnectionState>> {
        self.request(|reply| MeshCommand::State { peer_id, reply })
            .await
    }

    pub async fn peers(&self) -> Result<Vec<PeerId>> {
        self.request(|reply| MeshCommand::Peers { reply }).await
    }

    pub fn on<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&PeerEvent) + Send + Sync + 'static,
    {
        self.dispatcher.on(kind, handler);
    }

    pub fn context(&self) -> MeshContext {
        self.context.clone()
    }
}

use crate::transport::media::{self, LocalMediaSource};
use crate::transport::transport_config::TransportConfig;
use crate::transport::transport_event::TransportEvent;
use anyhow::{Context, Result};
use peermesh_core::{ConnectionStats, IceCandidate, PeerId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::stats::StatsReportType;
use webrtc::track::track_remote::TrackRemote;

/// One WebRTC peer connection plus the callbacks that feed the mesh loop.
pub struct ConnectionWrapper {
    /// Remote participant this connection leads to.
    pub peer_id: PeerId,
    /// Generation stamp; a replaced connection's events carry the old one.
    pub connection_id: u64,
    pub peer_connection: Arc<RTCPeerConnection>,
    /// Cloned into every callback and channel handler.
    event_tx: mpsc::UnboundedSender<TransportEvent>,
}

impl ConnectionWrapper {
    pub async fn new(
        peer_id: PeerId,
        connection_id: u64,
        config: &TransportConfig,
        media: Option<&Arc<dyn LocalMediaSource>>,
        event_tx: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let peer_connection = Arc::new(
            api.new_peer_connection(config.rtc_configuration())
                .await
                .context("failed to create peer connection")?,
        );

        // Connection state -> mesh loop
        let state_tx = event_tx.clone();
        let uid_state = peer_id.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |state: RTCPeerConnectionState| {
                info!(
                    "Peer connection {} ({}) state: {}",
                    uid_state, connection_id, state
                );
                let _ = state_tx.send(TransportEvent::StateChanged {
                    peer_id: uid_state.clone(),
                    connection_id,
                    state,
                });
                Box::pin(async {})
            },
        ));

        // Local ICE candidates -> trickled to the remote via the mesh loop
        let ice_tx = event_tx.clone();
        let uid_ice = peer_id.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            let uid = uid_ice.clone();

            Box::pin(async move {
                // None marks the end of gathering.
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let _ = tx.send(TransportEvent::CandidateGenerated {
                    peer_id: uid,
                    connection_id,
                    candidate: IceCandidate {
                        candidate: init.candidate,
                        sdp_mid: init.sdp_mid,
                        sdp_m_line_index: init.sdp_mline_index,
                    },
                });
            })
        }));

        // Answerer side: the offerer's control channel shows up here
        let dc_tx = event_tx.clone();
        let uid_dc = peer_id.clone();
        peer_connection.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let tx = dc_tx.clone();
            let uid = uid_dc.clone();

            Box::pin(async move {
                debug!("Remote data channel '{}' announced by {}", dc.label(), uid);
                attach_channel_handlers(&dc, uid, connection_id, tx);
            })
        }));

        // Remote media
        let track_tx = event_tx.clone();
        let uid_track = peer_id.clone();
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                debug!(
                    "Remote {} track from {} (stream {})",
                    track.kind(),
                    uid_track,
                    track.stream_id()
                );
                let _ = track_tx.send(TransportEvent::TrackReceived {
                    peer_id: uid_track.clone(),
                    connection_id,
                    track,
                });
                Box::pin(async {})
            },
        ));

        if let Some(source) = media {
            media::attach_tracks(&peer_connection, source.as_ref()).await?;
        }

        Ok(Self {
            peer_id,
            connection_id,
            peer_connection,
            event_tx,
        })
    }

    /// Creates the control channel on the offering side.
    pub async fn create_data_channel(&self, label: &str) -> Result<Arc<RTCDataChannel>> {
        let channel = self
            .peer_connection
            .create_data_channel(label, None)
            .await
            .with_context(|| format!("failed to create data channel '{label}'"))?;

        attach_channel_handlers(
            &channel,
            self.peer_id.clone(),
            self.connection_id,
            self.event_tx.clone(),
        );
        Ok(channel)
    }

    /// Creates an offer and sets it as the local description.
    pub async fn create_offer(&self) -> Result<String> {
        let offer = self.peer_connection.create_offer(None).await?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await
            .context("failed to set local offer")?;
        Ok(offer.sdp)
    }

    pub async fn set_remote_offer(&self, sdp: String) -> Result<()> {
        let desc = RTCSessionDescription::offer(sdp)?;
        self.peer_connection
            .set_remote_description(desc)
            .await
            .context("failed to apply remote offer")?;
        Ok(())
    }

    pub async fn set_remote_answer(&self, sdp: String) -> Result<()> {
        let desc = RTCSessionDescription::answer(sdp)?;
        self.peer_connection
            .set_remote_description(desc)
            .await
            .context("failed to apply remote answer")?;
        Ok(())
    }

    /// Creates an answer and sets it as the local description.
    pub async fn create_answer(&self) -> Result<String> {
        let answer = self.peer_connection.create_answer(None).await?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await
            .context("failed to set local answer")?;
        Ok(answer.sdp)
    }

    pub async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: None,
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .context("failed to add ICE candidate")?;
        Ok(())
    }

    pub async fn stats(&self) -> ConnectionStats {
        let report = self.peer_connection.get_stats().await;
        let mut stats = ConnectionStats::default();

        for (_, entry) in report.reports {
            match entry {
                StatsReportType::CandidatePair(pair) if pair.nominated => {
                    stats.bytes_sent = pair.bytes_sent;
                    stats.bytes_received = pair.bytes_received;
                    stats.round_trip_time = Some(pair.current_round_trip_time);
                }
                StatsReportType::RemoteInboundRTP(inbound) => {
                    stats.packets_lost += inbound.packets_lost;
                }
                _ => {}
            }
        }

        stats
    }

    pub async fn close(&self) -> Result<()> {
        self.peer_connection.close().await?;
        Ok(())
    }
}

fn attach_channel_handlers(
    channel: &Arc<RTCDataChannel>,
    peer_id: PeerId,
    connection_id: u64,
    tx: mpsc::UnboundedSender<TransportEvent>,
) {
    let open_channel = Arc::clone(channel);
    let tx_open = tx.clone();
    let uid_open = peer_id.clone();
    channel.on_open(Box::new(move || {
        info!("Data channel to {} is open", uid_open);
        let _ = tx_open.send(TransportEvent::DataChannelOpen {
            peer_id: uid_open,
            connection_id,
            channel: open_channel,
        });
        Box::pin(async {})
    }));

    channel.on_message(Box::new(move |msg: DataChannelMessage| {
        trace!("{} bytes from {}", msg.data.len(), peer_id);
        let _ = tx.send(TransportEvent::Message {
            peer_id: peer_id.clone(),
            connection_id,
            data: msg.data,
        });
        Box::pin(async {})
    }));
}

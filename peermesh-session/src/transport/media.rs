use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::trace;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::track::track_local::TrackLocal;

/// Supplies the local audio/video tracks attached to every new peer connection.
///
/// Capturing and encoding is up to the implementor; the mesh only attaches the
/// tracks and keeps their RTCP flowing.
pub trait LocalMediaSource: Send + Sync {
    fn tracks(&self) -> Vec<Arc<dyn TrackLocal + Send + Sync>>;
}

/// Tracks that were created up front and never change.
pub struct StaticMediaSource {
    tracks: Vec<Arc<dyn TrackLocal + Send + Sync>>,
}

impl StaticMediaSource {
    pub fn new(tracks: Vec<Arc<dyn TrackLocal + Send + Sync>>) -> Self {
        Self { tracks }
    }
}

impl LocalMediaSource for StaticMediaSource {
    fn tracks(&self) -> Vec<Arc<dyn TrackLocal + Send + Sync>> {
        self.tracks.clone()
    }
}

pub(crate) async fn attach_tracks(
    peer_connection: &Arc<RTCPeerConnection>,
    source: &dyn LocalMediaSource,
) -> Result<()> {
    for track in source.tracks() {
        let track_id = track.id().to_owned();
        let sender = peer_connection
            .add_track(track)
            .await
            .with_context(|| format!("failed to add local track {track_id}"))?;

        // Interceptors only run while RTCP is read.
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while sender.read(&mut buf).await.is_ok() {}
            trace!("RTCP reader for track {} finished", track_id);
        });
    }
    Ok(())
}

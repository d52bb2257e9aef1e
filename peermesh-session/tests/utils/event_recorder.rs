use bytes::Bytes;
use peermesh_core::{ControlMessage, PeerId};
use peermesh_session::{ConnectionState, EventKind, MeshBuilder, PeerEvent};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Simplified copy of a dispatched event, kept for assertions.
#[derive(Debug, Clone)]
pub enum RecordedEvent {
    LocalCandidate { peer_id: PeerId },
    StateChange { peer_id: PeerId, state: ConnectionState },
    RemoteTrack { peer_id: PeerId },
    Message { peer_id: PeerId, message: ControlMessage },
    Binary { peer_id: PeerId, data: Bytes },
    Disconnected { peer_id: PeerId },
}

impl From<&PeerEvent> for RecordedEvent {
    fn from(event: &PeerEvent) -> Self {
        match event {
            PeerEvent::IceCandidate { peer_id, .. } => Self::LocalCandidate {
                peer_id: peer_id.clone(),
            },
            PeerEvent::ConnectionStateChange { peer_id, state } => Self::StateChange {
                peer_id: peer_id.clone(),
                state: *state,
            },
            PeerEvent::RemoteTrack { peer_id, .. } => Self::RemoteTrack {
                peer_id: peer_id.clone(),
            },
            PeerEvent::DataChannelMessage { peer_id, message } => Self::Message {
                peer_id: peer_id.clone(),
                message: message.clone(),
            },
            PeerEvent::DataChannelBinary { peer_id, data } => Self::Binary {
                peer_id: peer_id.clone(),
                data: data.clone(),
            },
            PeerEvent::PeerDisconnected { peer_id } => Self::Disconnected {
                peer_id: peer_id.clone(),
            },
        }
    }
}

/// Listener that records every event a mesh emits.
///
/// # Example
///
/// ```ignore
/// let recorder = EventRecorder::new();
/// let handle = recorder.attach(MeshBuilder::new(id)).spawn(signaling)?;
///
/// recorder.wait_for(|e| e.iter().any(|e| matches!(e, RecordedEvent::Disconnected { .. })), 5000);
/// ```
#[derive(Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to every event kind on the builder.
    pub fn attach(&self, mut builder: MeshBuilder) -> MeshBuilder {
        for kind in EventKind::ALL {
            let events = Arc::clone(&self.events);
            builder = builder.on(kind, move |event| {
                events.lock().unwrap().push(RecordedEvent::from(event));
            });
        }
        builder
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Polls until `predicate` holds for the recorded events.
    pub async fn wait_for<F>(&self, predicate: F, timeout_ms: u64) -> bool
    where
        F: Fn(&[RecordedEvent]) -> bool,
    {
        let start = Instant::now();
        let timeout = Duration::from_millis(timeout_ms);

        loop {
            if predicate(&self.events.lock().unwrap()) {
                return true;
            }
            if start.elapsed() > timeout {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    pub async fn wait_for_disconnect(&self, peer_id: &PeerId, timeout_ms: u64) -> bool {
        self.wait_for(|events| count_disconnects(events, peer_id) > 0, timeout_ms)
            .await
    }

    pub async fn wait_for_messages(&self, peer_id: &PeerId, count: usize, timeout_ms: u64) -> bool {
        self.wait_for(
            |events| {
                events
                    .iter()
                    .filter(|e| matches!(e, RecordedEvent::Message { peer_id: id, .. } if id == peer_id))
                    .count()
                    >= count
            },
            timeout_ms,
        )
        .await
    }

    pub fn has_state(&self, peer_id: &PeerId, state: ConnectionState) -> bool {
        self.events().iter().any(|e| {
            matches!(e, RecordedEvent::StateChange { peer_id: id, state: s } if id == peer_id && *s == state)
        })
    }

    pub fn disconnect_count(&self, peer_id: &PeerId) -> usize {
        count_disconnects(&self.events(), peer_id)
    }

    pub fn messages_from(&self, peer_id: &PeerId) -> Vec<ControlMessage> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RecordedEvent::Message { peer_id: id, message } if &id == peer_id => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn binary_from(&self, peer_id: &PeerId) -> Vec<Bytes> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RecordedEvent::Binary { peer_id: id, data } if &id == peer_id => Some(data),
                _ => None,
            })
            .collect()
    }
}

fn count_disconnects(events: &[RecordedEvent], peer_id: &PeerId) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, RecordedEvent::Disconnected { peer_id: id } if id == peer_id))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recorder_counts_disconnects_per_peer() {
        let recorder = EventRecorder::new();
        let alice = PeerId::from("alice");

        recorder
            .events
            .lock()
            .unwrap()
            .push(RecordedEvent::from(&PeerEvent::PeerDisconnected {
                peer_id: alice.clone(),
            }));

        assert!(recorder.wait_for_disconnect(&alice, 100).await);
        assert_eq!(recorder.disconnect_count(&alice), 1);
        assert_eq!(recorder.disconnect_count(&PeerId::from("bob")), 0);
    }
}

use crate::dispatch::peer_event::{EventKind, PeerEvent};
use dashmap::DashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::error;

pub type EventHandler = Arc<dyn Fn(&PeerEvent) + Send + Sync>;

/// Fans mesh events out to registered listeners.
///
/// Listeners run synchronously, in registration order. A panicking listener
/// is logged and the remaining listeners still run.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    handlers: Arc<DashMap<EventKind, Vec<EventHandler>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registration is append-only.
    pub fn on<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&PeerEvent) + Send + Sync + 'static,
    {
        self.handlers.entry(kind).or_default().push(Arc::new(handler));
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, |h| h.len())
    }

    /// Returns how many listeners completed without panicking.
    pub fn emit(&self, event: &PeerEvent) -> usize {
        let kind = event.kind();
        // Snapshot so a listener may register more listeners without deadlocking.
        let handlers = match self.handlers.get(&kind) {
            Some(entry) => entry.value().clone(),
            None => return 0,
        };

        let mut completed = 0;
        for (index, handler) in handlers.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(()) => completed += 1,
                Err(panic) => {
                    let reason = panic
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_owned())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_owned());
                    error!(
                        "{} listener #{} for {} panicked: {}",
                        kind,
                        index,
                        event.peer_id(),
                        reason
                    );
                }
            }
        }
        completed
    }
}

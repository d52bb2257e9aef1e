mod event_dispatcher;
mod peer_event;

pub use event_dispatcher::*;
pub use peer_event::*;

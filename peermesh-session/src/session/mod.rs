mod connection_state;
mod ice_queue;
mod peer_session;
mod session_registry;

pub use connection_state::*;
pub use ice_queue::*;
pub use peer_session::*;
pub use session_registry::SessionRegistry;
pub(crate) use session_registry::OpenChannels;

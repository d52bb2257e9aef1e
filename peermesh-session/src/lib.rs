//! Full-mesh WebRTC session manager.
//!
//! One [`PeerSession`] per remote participant, negotiated over an abstract
//! signaling bus and carrying a single ordered control channel.

mod dispatch;
mod error;
mod mesh;
mod session;
mod signaling;
mod transport;

pub use dispatch::*;
pub use error::*;
pub use mesh::*;
pub use session::*;
pub use signaling::*;
pub use transport::*;

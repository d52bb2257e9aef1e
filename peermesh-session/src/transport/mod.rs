mod connection_wrapper;
mod media;
mod transport_config;
mod transport_event;

pub use connection_wrapper::*;
pub use media::{LocalMediaSource, StaticMediaSource};
pub use transport_config::*;
pub use transport_event::*;

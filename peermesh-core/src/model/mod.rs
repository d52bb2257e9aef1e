mod control;
mod file;
mod peer;
mod signaling;
mod stats;

pub use control::{ChatMessage, ControlMessage, DrawStroke, FileInfo, Point, TranscriptEntry};
pub use file::{
    FILE_CHUNK_SIZE, FileAssembler, FileChunker, FileError, FileProgress, FileReceiver,
    ReceivedFile,
};
pub use peer::PeerId;
pub use signaling::{IceCandidate, IceServerConfig, Signal, SignalMessage};
pub use stats::ConnectionStats;

//! Binary file sub-protocol.
//!
//! A transfer is a `file-info` control message followed by raw binary frames
//! on the same ordered channel until `size` bytes have been delivered.

use crate::model::control::FileInfo;
use crate::model::peer::PeerId;
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use thiserror::Error;

/// Size of one binary frame. Stays under the SCTP message size every browser accepts.
pub const FILE_CHUNK_SIZE: usize = 16 * 1024;

const MAX_PREALLOC: usize = 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FileError {
    #[error("binary frame received without a preceding file-info")]
    Unannounced,
    #[error("file {id} overflowed: expected {expected} bytes, got {received}")]
    Overflow {
        id: String,
        expected: u64,
        received: u64,
    },
}

/// Splits a payload into [`FILE_CHUNK_SIZE`] frames without copying.
pub struct FileChunker {
    remaining: Bytes,
}

impl FileChunker {
    pub fn new(data: Bytes) -> Self {
        Self { remaining: data }
    }
}

impl Iterator for FileChunker {
    type Item = Bytes;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.is_empty() {
            return None;
        }
        let at = self.remaining.len().min(FILE_CHUNK_SIZE);
        Some(self.remaining.split_to(at))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileProgress {
    pub received: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedFile {
    pub info: FileInfo,
    pub data: Bytes,
}

/// Accumulates the frames of one announced file.
#[derive(Debug)]
pub struct FileAssembler {
    info: FileInfo,
    buffer: BytesMut,
}

impl FileAssembler {
    pub fn new(info: FileInfo) -> Self {
        let capacity = usize::try_from(info.size)
            .unwrap_or(MAX_PREALLOC)
            .min(MAX_PREALLOC);
        Self {
            info,
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    pub fn info(&self) -> &FileInfo {
        &self.info
    }

    pub fn push(&mut self, chunk: &[u8]) -> Result<FileProgress, FileError> {
        let received = self.buffer.len() as u64 + chunk.len() as u64;
        if received > self.info.size {
            return Err(FileError::Overflow {
                id: self.info.id.clone(),
                expected: self.info.size,
                received,
            });
        }
        self.buffer.extend_from_slice(chunk);
        Ok(self.progress())
    }

    pub fn progress(&self) -> FileProgress {
        FileProgress {
            received: self.buffer.len() as u64,
            total: self.info.size,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.buffer.len() as u64 == self.info.size
    }

    pub fn finish(self) -> ReceivedFile {
        ReceivedFile {
            info: self.info,
            data: self.buffer.freeze(),
        }
    }
}

/// Pairs each peer's `file-info` announcements with the binary frames that follow.
///
/// Frames from one peer arrive in order, so each peer has at most one transfer
/// in flight. A new announcement replaces an unfinished one.
#[derive(Debug, Default)]
pub struct FileReceiver {
    transfers: HashMap<PeerId, FileAssembler>,
}

impl FileReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a transfer. Empty files complete immediately.
    pub fn announce(&mut self, peer_id: PeerId, info: FileInfo) -> Option<ReceivedFile> {
        let assembler = FileAssembler::new(info);
        if assembler.is_complete() {
            self.transfers.remove(&peer_id);
            return Some(assembler.finish());
        }
        self.transfers.insert(peer_id, assembler);
        None
    }

    pub fn receive_chunk(
        &mut self,
        peer_id: &PeerId,
        chunk: &[u8],
    ) -> Result<Option<ReceivedFile>, FileError> {
        let Some(assembler) = self.transfers.get_mut(peer_id) else {
            return Err(FileError::Unannounced);
        };

        if let Err(e) = assembler.push(chunk) {
            self.transfers.remove(peer_id);
            return Err(e);
        }

        if !assembler.is_complete() {
            return Ok(None);
        }
        Ok(self.transfers.remove(peer_id).map(FileAssembler::finish))
    }

    pub fn progress(&self, peer_id: &PeerId) -> Option<FileProgress> {
        self.transfers.get(peer_id).map(FileAssembler::progress)
    }

    /// Drops any unfinished transfer from a departed peer.
    pub fn forget(&mut self, peer_id: &PeerId) -> Option<FileInfo> {
        self.transfers.remove(peer_id).map(|a| a.info)
    }
}

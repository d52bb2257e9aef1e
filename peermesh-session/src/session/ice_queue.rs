use peermesh_core::IceCandidate;
use std::collections::VecDeque;

/// What to do with a remote candidate right now.
#[derive(Debug, PartialEq)]
pub enum Admission {
    ApplyNow(IceCandidate),
    Queued,
}

/// Holds remote ICE candidates that arrive before the remote description.
///
/// Candidates are released exactly once, in arrival order, when the remote
/// description is set. After that the queue stays empty.
#[derive(Debug, Default)]
pub struct IceCandidateQueue {
    pending: VecDeque<IceCandidate>,
    remote_description_set: bool,
}

impl IceCandidateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit(&mut self, candidate: IceCandidate) -> Admission {
        if self.remote_description_set {
            Admission::ApplyNow(candidate)
        } else {
            self.pending.push_back(candidate);
            Admission::Queued
        }
    }

    /// Flips the gate and returns everything buffered so far, oldest first.
    pub fn mark_remote_description_set(&mut self) -> Vec<IceCandidate> {
        self.remote_description_set = true;
        self.pending.drain(..).collect()
    }

    pub fn remote_description_set(&self) -> bool {
        self.remote_description_set
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

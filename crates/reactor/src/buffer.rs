//! The reactor's two vote buffers and the block-time retention ring.

use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use tidemark_wire::{GossipVote, Vote};

/// What happened when a batch was offered to the gossip buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// First batch seen for this validator.
    FirstEntry,
    /// Strictly newer than the stored batch; replaced it.
    Replaced,
    /// Not newer than the stored batch; dropped.
    Stale,
}

/// Per-validator latest-signed-batch store.
///
/// Keyed by upper-hex validator address. Ingress goes through [`install`],
/// which enforces the strictly-greater `signed_timestamp` replacement rule;
/// the local signer uses [`install_own`], which replaces unconditionally
/// (its clock only moves forward, and re-signing within the same second must
/// not wedge the entry).
///
/// [`install`]: GossipVoteBuffer::install
/// [`install_own`]: GossipVoteBuffer::install_own
#[derive(Default)]
pub struct GossipVoteBuffer {
    buffer: RwLock<HashMap<String, GossipVote>>,
}

impl GossipVoteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a verified batch received from a peer.
    pub fn install(&self, address: String, batch: GossipVote) -> InstallOutcome {
        let mut buffer = self.buffer.write();
        match buffer.get(&address) {
            None => {
                buffer.insert(address, batch);
                InstallOutcome::FirstEntry
            }
            Some(current) if batch.signed_timestamp > current.signed_timestamp => {
                buffer.insert(address, batch);
                InstallOutcome::Replaced
            }
            Some(_) => InstallOutcome::Stale,
        }
    }

    /// Install this validator's own freshly signed batch.
    pub fn install_own(&self, address: String, batch: GossipVote) {
        self.buffer.write().insert(address, batch);
    }

    /// The stored batch for an address, if any.
    pub fn get(&self, address: &str) -> Option<GossipVote> {
        self.buffer.read().get(address).cloned()
    }

    /// Clone the current contents for one broadcast pass.
    pub fn snapshot(&self) -> Vec<GossipVote> {
        self.buffer.read().values().cloned().collect()
    }

    /// Evict every batch with `signed_timestamp < cutoff`. Returns how many
    /// were dropped.
    pub fn prune_older_than(&self, cutoff: i64) -> usize {
        let mut buffer = self.buffer.write();
        let before = buffer.len();
        buffer.retain(|_, batch| batch.signed_timestamp >= cutoff);
        before - buffer.len()
    }

    pub fn len(&self) -> usize {
        self.buffer.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.read().is_empty()
    }
}

/// Votes awaiting inclusion in the next signed batch.
///
/// Appended by the signer (with freshly drained observations), filtered by
/// the block-time pruner. Not kept sorted; sorting happens at sign time.
#[derive(Default)]
pub struct UnsignedVoteBuffer {
    buffer: RwLock<Vec<Vote>>,
}

impl UnsignedVoteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append drained votes and return the whole buffer for signing, in one
    /// critical section.
    pub fn append_and_snapshot(&self, drained: Vec<Vote>) -> Vec<Vote> {
        let mut buffer = self.buffer.write();
        buffer.extend(drained);
        buffer.clone()
    }

    /// Drop every vote with `timestamp < cutoff`. Returns how many were
    /// dropped.
    pub fn prune_before(&self, cutoff: i64) -> usize {
        let mut buffer = self.buffer.write();
        let before = buffer.len();
        buffer.retain(|vote| vote.timestamp >= cutoff);
        before - buffer.len()
    }

    pub fn snapshot(&self) -> Vec<Vote> {
        self.buffer.read().clone()
    }

    pub fn len(&self) -> usize {
        self.buffer.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.read().is_empty()
    }
}

/// Sliding window of the last N distinct block timestamps.
///
/// The retention window for unsigned votes is N distinct block times wide,
/// not N seconds: the cutoff is the oldest retained block time, available
/// only once the ring is full.
#[derive(Debug)]
pub struct BlockTimestampRing {
    window: VecDeque<i64>,
    capacity: usize,
}

impl BlockTimestampRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity + 1),
            capacity: capacity.max(1),
        }
    }

    /// Feed the latest observed block time; returns the pruning cutoff when
    /// the ring is full.
    pub fn observe(&mut self, block_time: i64) -> Option<i64> {
        if !self.window.contains(&block_time) {
            self.window.push_back(block_time);
        }
        if self.window.len() < self.capacity {
            return None;
        }
        while self.window.len() > self.capacity {
            self.window.pop_front();
        }
        self.window.front().copied()
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

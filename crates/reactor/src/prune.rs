//! The two pruning loops: block-time retention and wall-clock eviction.

use crate::buffer::{BlockTimestampRing, GossipVoteBuffer, UnsignedVoteBuffer};
use crate::metrics;
use crate::signer::unix_now;
use crate::state::ChainStateReader;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Cadence of the unsigned-vote retention pass.
const UNSIGNED_PRUNE_INTERVAL: Duration = Duration::from_secs(1);

/// Cadence of the gossip-buffer eviction pass.
const GOSSIP_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Batches older than this fall out of the gossip buffer.
const GOSSIP_EVICTION_HORIZON: Duration = Duration::from_secs(60);

/// Discards unsigned votes older than the retention window of distinct
/// block timestamps.
pub(crate) struct UnsignedVotePruner {
    state: Arc<dyn ChainStateReader>,
    unsigned: Arc<UnsignedVoteBuffer>,
    // Unshared: only this loop reads or writes the ring.
    ring: BlockTimestampRing,
}

impl UnsignedVotePruner {
    pub(crate) fn new(
        state: Arc<dyn ChainStateReader>,
        unsigned: Arc<UnsignedVoteBuffer>,
        max_gossip_vote_age: usize,
    ) -> Self {
        Self {
            state,
            unsigned,
            ring: BlockTimestampRing::new(max_gossip_vote_age),
        }
    }

    pub(crate) async fn run(mut self, shutdown: CancellationToken) {
        info!("unsigned vote pruner started");
        let mut tick = tokio::time::interval(UNSIGNED_PRUNE_INTERVAL);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tick.tick() => self.prune_pass(),
            }
        }
        info!("unsigned vote pruner stopped");
    }

    /// One retention pass against the latest observed block time.
    pub(crate) fn prune_pass(&mut self) {
        let block_time = self.state.last_block_time();
        let Some(cutoff) = self.ring.observe(block_time) else {
            return;
        };
        let removed = self.unsigned.prune_before(cutoff);
        if removed > 0 {
            metrics::record_unsigned_pruned(removed, self.unsigned.len());
            debug!(removed, cutoff, "pruned unsigned votes");
        }
    }
}

/// Evicts gossip entries older than the wall-clock horizon.
pub(crate) struct GossipPruner {
    gossip: Arc<GossipVoteBuffer>,
}

impl GossipPruner {
    pub(crate) fn new(gossip: Arc<GossipVoteBuffer>) -> Self {
        Self { gossip }
    }

    pub(crate) async fn run(self, shutdown: CancellationToken) {
        info!("gossip buffer pruner started");
        let mut tick = tokio::time::interval(GOSSIP_PRUNE_INTERVAL);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tick.tick() => self.prune_pass(unix_now()),
            }
        }
        info!("gossip buffer pruner stopped");
    }

    /// One eviction pass at wall-clock `now`.
    pub(crate) fn prune_pass(&self, now: i64) {
        let cutoff = now - GOSSIP_EVICTION_HORIZON.as_secs() as i64;
        let removed = self.gossip.prune_older_than(cutoff);
        if removed > 0 {
            metrics::record_gossip_evicted(removed);
            metrics::set_gossip_buffer_size(self.gossip.len());
            debug!(removed, cutoff, "evicted stale gossip entries");
        }
    }
}

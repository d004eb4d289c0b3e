//! The vote signer loop: drain, batch, sign, install.

use crate::buffer::{GossipVoteBuffer, UnsignedVoteBuffer};
use crate::metrics;
use crate::state::ChainStateReader;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tidemark_types::PrivValidator;
use tidemark_wire::{sign_bytes, sort_votes, GossipVote, Vote};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Periodically turns the unsigned-vote buffer into this validator's current
/// gossip entry.
///
/// Each tick drains whatever the producers have queued, appends it to the
/// unsigned buffer, and signs the *entire* buffer: any peer receiving one
/// recent batch from us obtains the full retention window, so losses are
/// self-healing.
pub(crate) struct VoteSigner {
    sign_interval: Duration,
    chain_id: String,
    priv_validator: Arc<dyn PrivValidator>,
    state: Arc<dyn ChainStateReader>,
    unsigned: Arc<UnsignedVoteBuffer>,
    gossip: Arc<GossipVoteBuffer>,
    vote_rx: mpsc::UnboundedReceiver<Vote>,
}

impl VoteSigner {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        sign_interval: Duration,
        chain_id: String,
        priv_validator: Arc<dyn PrivValidator>,
        state: Arc<dyn ChainStateReader>,
        unsigned: Arc<UnsignedVoteBuffer>,
        gossip: Arc<GossipVoteBuffer>,
        vote_rx: mpsc::UnboundedReceiver<Vote>,
    ) -> Self {
        Self {
            sign_interval,
            chain_id,
            priv_validator,
            state,
            unsigned,
            gossip,
            vote_rx,
        }
    }

    /// Run until `shutdown` fires. Ticks are serial: one sign in flight at a
    /// time.
    pub(crate) async fn run(mut self, shutdown: CancellationToken) {
        info!(interval = ?self.sign_interval, "vote signer started");
        let mut tick = tokio::time::interval(self.sign_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tick.tick() => self.sign_tick(unix_now()),
            }
        }
        info!("vote signer stopped");
    }

    /// One signing pass. Never blocks waiting for a minimum batch size.
    pub(crate) fn sign_tick(&mut self, now: i64) {
        let mut drained = Vec::new();
        while let Ok(vote) = self.vote_rx.try_recv() {
            drained.push(vote);
        }
        if drained.is_empty() {
            return;
        }

        let pub_key = self.priv_validator.public_key();
        let address = pub_key.address().to_string();

        // Not being in the set is non-fatal: the set may rotate us in later.
        let validator_set = self.state.validator_set();
        if !validator_set.has_address(&address) {
            warn!(validator = %address, "not in validator set, skipping sign tick");
            return;
        }

        let mut votes = self.unsigned.append_and_snapshot(drained);
        sort_votes(&mut votes);

        let mut batch = GossipVote {
            pub_key: pub_key.to_bytes(),
            votes,
            signed_timestamp: now,
            signature: Vec::new(),
            sign_type: pub_key.scheme().as_str().to_string(),
        };

        let message = sign_bytes(&batch, &self.chain_id);
        match self.priv_validator.sign(&message) {
            Ok(signature) => batch.signature = signature,
            Err(err) => {
                error!(error = %err, "batch signing failed");
                return;
            }
        }

        let batch_len = batch.votes.len();
        self.gossip.install_own(address.clone(), batch);
        metrics::record_batch_signed(batch_len);
        metrics::set_gossip_buffer_size(self.gossip.len());
        debug!(validator = %address, votes = batch_len, "installed signed batch");
    }
}

/// Wall-clock seconds since the epoch.
pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StaticChainState;
    use tidemark_types::{KeyPair, PublicKey, SignScheme, ValidatorInfo, ValidatorSet};

    fn vote(oracle_id: &str, timestamp: i64, data: &str) -> Vote {
        Vote {
            validator: String::new(),
            oracle_id: oracle_id.to_string(),
            timestamp,
            data: data.to_string(),
        }
    }

    struct Fixture {
        signer: VoteSigner,
        vote_tx: mpsc::UnboundedSender<Vote>,
        gossip: Arc<GossipVoteBuffer>,
        unsigned: Arc<UnsignedVoteBuffer>,
        address: String,
        pub_key: PublicKey,
    }

    fn fixture(in_validator_set: bool) -> Fixture {
        let keypair = Arc::new(KeyPair::generate(SignScheme::Ed25519));
        let pub_key = keypair.public_key();
        let address = pub_key.address().to_string();

        let validators = if in_validator_set {
            ValidatorSet::new(vec![ValidatorInfo::new(pub_key.clone(), 10)])
        } else {
            ValidatorSet::default()
        };

        let state = Arc::new(StaticChainState::new(validators));
        let unsigned = Arc::new(UnsignedVoteBuffer::new());
        let gossip = Arc::new(GossipVoteBuffer::new());
        let (vote_tx, vote_rx) = mpsc::unbounded_channel();

        let signer = VoteSigner::new(
            Duration::from_millis(100),
            "tidemark-test-1".to_string(),
            keypair,
            state,
            unsigned.clone(),
            gossip.clone(),
            vote_rx,
        );

        Fixture {
            signer,
            vote_tx,
            gossip,
            unsigned,
            address,
            pub_key,
        }
    }

    #[tokio::test]
    async fn signs_sorted_full_buffer() {
        let mut fx = fixture(true);
        fx.vote_tx.send(vote("B", 2, "x")).unwrap();
        fx.vote_tx.send(vote("A", 5, "y")).unwrap();
        fx.vote_tx.send(vote("B", 1, "z")).unwrap();

        fx.signer.sign_tick(1000);

        let batch = fx.gossip.get(&fx.address).expect("batch installed");
        assert_eq!(batch.signed_timestamp, 1000);
        assert_eq!(
            batch.votes,
            vec![vote("A", 5, "y"), vote("B", 1, "z"), vote("B", 2, "x")]
        );
        assert_eq!(batch.sign_type, "ed25519");

        // The installed batch verifies over its canonical encoding.
        let message = sign_bytes(&batch, "tidemark-test-1");
        assert!(fx.pub_key.verify(&message, &batch.signature));
    }

    #[tokio::test]
    async fn resigns_whole_window_on_next_tick() {
        let mut fx = fixture(true);
        fx.vote_tx.send(vote("BTC", 10, "1")).unwrap();
        fx.signer.sign_tick(1000);

        fx.vote_tx.send(vote("ETH", 20, "2")).unwrap();
        fx.signer.sign_tick(1001);

        let batch = fx.gossip.get(&fx.address).unwrap();
        // Both the old and the new observation are in the latest batch.
        assert_eq!(batch.votes.len(), 2);
        assert_eq!(fx.unsigned.len(), 2);
    }

    #[tokio::test]
    async fn empty_drain_does_nothing() {
        let mut fx = fixture(true);
        fx.signer.sign_tick(1000);
        assert!(fx.gossip.get(&fx.address).is_none());
    }

    #[tokio::test]
    async fn missing_validator_skips_tick() {
        let mut fx = fixture(false);
        fx.vote_tx.send(vote("BTC", 10, "1")).unwrap();
        fx.signer.sign_tick(1000);
        assert!(fx.gossip.get(&fx.address).is_none());
    }

    #[tokio::test]
    async fn two_signers_agree_on_order() {
        let mut fx_a = fixture(true);
        let mut fx_b = fixture(true);

        // Same multiset, different arrival orders.
        for v in [vote("B", 2, "x"), vote("A", 5, "y"), vote("B", 1, "z")] {
            fx_a.vote_tx.send(v).unwrap();
        }
        for v in [vote("B", 1, "z"), vote("B", 2, "x"), vote("A", 5, "y")] {
            fx_b.vote_tx.send(v).unwrap();
        }

        fx_a.signer.sign_tick(1000);
        fx_b.signer.sign_tick(1000);

        let batch_a = fx_a.gossip.get(&fx_a.address).unwrap();
        let batch_b = fx_b.gossip.get(&fx_b.address).unwrap();
        assert_eq!(batch_a.votes, batch_b.votes);
    }
}

//! The per-peer broadcast loop.

use crate::buffer::GossipVoteBuffer;
use crate::metrics;
use crate::peer::{Envelope, Peer, ORACLE_CHANNEL_ID};
use std::sync::Arc;
use std::time::Duration;
use tidemark_wire::encode_gossip_vote;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How long to back off when a peer's send queue is full.
const PEER_CATCHUP_SLEEP: Duration = Duration::from_millis(100);

/// Pause between broadcast passes over the buffer.
const BROADCAST_INTERVAL: Duration = Duration::from_millis(200);

/// Stream the gossip buffer to one peer until the peer or the reactor stops.
///
/// There is no per-peer deduplication: the same batch may be sent on every
/// pass. The receiver's strict-timestamp rule absorbs the redundancy. A
/// rejected send backs off briefly and moves on to the next entry of the
/// same snapshot.
pub(crate) async fn broadcast_votes_routine(
    peer: Arc<dyn Peer>,
    gossip: Arc<GossipVoteBuffer>,
    shutdown: CancellationToken,
) {
    debug!(peer = %peer.id(), "broadcast routine started");
    loop {
        if shutdown.is_cancelled() || !peer.is_running() {
            break;
        }

        for batch in gossip.snapshot() {
            if shutdown.is_cancelled() || !peer.is_running() {
                debug!(peer = %peer.id(), "broadcast routine stopped");
                return;
            }

            let payload = match encode_gossip_vote(&batch) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(error = %err, "skipping unencodable batch");
                    continue;
                }
            };

            let sent = peer.try_send(Envelope {
                channel_id: ORACLE_CHANNEL_ID,
                payload,
            });
            if !sent {
                metrics::record_peer_send_rejected();
                debug!(peer = %peer.id(), "peer send rejected, backing off");
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(PEER_CATCHUP_SLEEP) => {}
                }
            }
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(BROADCAST_INTERVAL) => {}
        }
    }
    debug!(peer = %peer.id(), "broadcast routine stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tidemark_wire::{decode_gossip_vote, GossipVote};

    struct FakePeer {
        id: String,
        running: AtomicBool,
        accepting: AtomicBool,
        received: Mutex<Vec<Envelope>>,
    }

    impl FakePeer {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                id: "fake-peer".to_string(),
                running: AtomicBool::new(true),
                accepting: AtomicBool::new(true),
                received: Mutex::new(Vec::new()),
            })
        }
    }

    impl Peer for FakePeer {
        fn id(&self) -> &str {
            &self.id
        }

        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }

        fn try_send(&self, envelope: Envelope) -> bool {
            if !self.accepting.load(Ordering::SeqCst) {
                return false;
            }
            self.received.lock().push(envelope);
            true
        }
    }

    fn batch(ts: i64) -> GossipVote {
        GossipVote {
            pub_key: vec![1u8; 32],
            votes: vec![],
            signed_timestamp: ts,
            signature: vec![2u8; 64],
            sign_type: "ed25519".to_string(),
        }
    }

    #[tokio::test]
    async fn streams_buffer_contents_to_peer() {
        let gossip = Arc::new(GossipVoteBuffer::new());
        gossip.install("A".to_string(), batch(1000));
        let peer = FakePeer::new();
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(broadcast_votes_routine(
            peer.clone(),
            gossip.clone(),
            shutdown.clone(),
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let received = peer.received.lock();
            assert!(!received.is_empty());
            assert_eq!(received[0].channel_id, ORACLE_CHANNEL_ID);
            let decoded = decode_gossip_vote(&received[0].payload).unwrap();
            assert_eq!(decoded.signed_timestamp, 1000);
        }

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("routine exits on shutdown")
            .unwrap();
    }

    #[tokio::test]
    async fn exits_when_peer_stops() {
        let gossip = Arc::new(GossipVoteBuffer::new());
        let peer = FakePeer::new();
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(broadcast_votes_routine(
            peer.clone(),
            gossip,
            shutdown.clone(),
        ));
        peer.running.store(false, Ordering::SeqCst);

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("routine exits when peer stops")
            .unwrap();
    }

    #[tokio::test]
    async fn backs_off_on_rejected_send_and_recovers() {
        let gossip = Arc::new(GossipVoteBuffer::new());
        gossip.install("A".to_string(), batch(1000));
        let peer = FakePeer::new();
        peer.accepting.store(false, Ordering::SeqCst);
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(broadcast_votes_routine(
            peer.clone(),
            gossip,
            shutdown.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(peer.received.lock().is_empty());

        peer.accepting.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!peer.received.lock().is_empty());

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("routine exits on shutdown")
            .unwrap();
    }
}

//! Reactor metrics on the default Prometheus registry.
//!
//! Domain-specific counters rather than generic event counters; use traces
//! for event-level granularity during investigations.

use prometheus::{register_counter, register_gauge, Counter, Gauge};
use std::sync::OnceLock;

static METRICS: OnceLock<Metrics> = OnceLock::new();

struct Metrics {
    // === Ingress ===
    batches_received: Counter,
    batches_accepted: Counter,
    batches_stale: Counter,
    signature_failures: Counter,
    malformed_messages: Counter,

    // === Signer ===
    batches_signed: Counter,

    // === Buffers ===
    gossip_buffer_size: Gauge,
    unsigned_buffer_size: Gauge,
    unsigned_votes_pruned: Counter,
    gossip_batches_evicted: Counter,

    // === Broadcast ===
    peer_sends_rejected: Counter,
}

impl Metrics {
    fn new() -> Self {
        Self {
            batches_received: register_counter!(
                "tidemark_oracle_batches_received_total",
                "Gossip batches received from peers"
            )
            .unwrap(),
            batches_accepted: register_counter!(
                "tidemark_oracle_batches_accepted_total",
                "Verified gossip batches installed or replaced in the buffer"
            )
            .unwrap(),
            batches_stale: register_counter!(
                "tidemark_oracle_batches_stale_total",
                "Verified gossip batches dropped for a non-increasing timestamp"
            )
            .unwrap(),
            signature_failures: register_counter!(
                "tidemark_oracle_signature_failures_total",
                "Gossip batches dropped for bad or unsupported signatures"
            )
            .unwrap(),
            malformed_messages: register_counter!(
                "tidemark_oracle_malformed_messages_total",
                "Undecodable messages dropped at ingress"
            )
            .unwrap(),
            batches_signed: register_counter!(
                "tidemark_oracle_batches_signed_total",
                "Batches signed and installed by the local signer"
            )
            .unwrap(),
            gossip_buffer_size: register_gauge!(
                "tidemark_oracle_gossip_buffer_size",
                "Validators with a live entry in the gossip buffer"
            )
            .unwrap(),
            unsigned_buffer_size: register_gauge!(
                "tidemark_oracle_unsigned_buffer_size",
                "Votes currently in the unsigned buffer"
            )
            .unwrap(),
            unsigned_votes_pruned: register_counter!(
                "tidemark_oracle_unsigned_votes_pruned_total",
                "Unsigned votes dropped by block-time retention"
            )
            .unwrap(),
            gossip_batches_evicted: register_counter!(
                "tidemark_oracle_gossip_batches_evicted_total",
                "Gossip batches evicted by the wall-clock horizon"
            )
            .unwrap(),
            peer_sends_rejected: register_counter!(
                "tidemark_oracle_peer_sends_rejected_total",
                "Broadcast sends rejected by a congested peer queue"
            )
            .unwrap(),
        }
    }
}

fn metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}

pub(crate) fn record_batch_received() {
    metrics().batches_received.inc();
}

pub(crate) fn record_batch_accepted() {
    metrics().batches_accepted.inc();
}

pub(crate) fn record_batch_stale() {
    metrics().batches_stale.inc();
}

pub(crate) fn record_signature_failure() {
    metrics().signature_failures.inc();
}

pub(crate) fn record_malformed_message() {
    metrics().malformed_messages.inc();
}

pub(crate) fn record_batch_signed(unsigned_len: usize) {
    metrics().batches_signed.inc();
    metrics().unsigned_buffer_size.set(unsigned_len as f64);
}

pub(crate) fn set_gossip_buffer_size(len: usize) {
    metrics().gossip_buffer_size.set(len as f64);
}

pub(crate) fn record_unsigned_pruned(count: usize, remaining: usize) {
    metrics().unsigned_votes_pruned.inc_by(count as f64);
    metrics().unsigned_buffer_size.set(remaining as f64);
}

pub(crate) fn record_gossip_evicted(count: usize) {
    metrics().gossip_batches_evicted.inc_by(count as f64);
}

pub(crate) fn record_peer_send_rejected() {
    metrics().peer_sends_rejected.inc();
}

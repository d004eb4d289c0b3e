//! Message definitions and the canonical signing encoding.

use prost::Message;
use std::cmp::Ordering;

/// A single oracle observation.
///
/// In gossip form `validator` may be empty: signer identity is carried on
/// the enclosing batch, not per vote.
#[derive(Clone, PartialEq, Eq, Hash, Message)]
pub struct Vote {
    /// Address of the submitting validator (may be empty in gossip form).
    #[prost(string, tag = "1")]
    pub validator: String,
    /// The oracle this observation belongs to.
    #[prost(string, tag = "2")]
    pub oracle_id: String,
    /// Observation time, seconds, normalized to the oracle's resolution.
    #[prost(int64, tag = "3")]
    pub timestamp: i64,
    /// Opaque payload, typically a decimal string.
    #[prost(string, tag = "4")]
    pub data: String,
}

/// One validator's current signed batch of votes.
#[derive(Clone, PartialEq, Message)]
pub struct GossipVote {
    /// Raw public key bytes of the signer.
    #[prost(bytes = "vec", tag = "1")]
    pub pub_key: Vec<u8>,
    /// Votes in the contract order (see [`sort_votes`]).
    #[prost(message, repeated, tag = "2")]
    pub votes: Vec<Vote>,
    /// Batch signing time, seconds. Strictly monotonic per signer.
    #[prost(int64, tag = "3")]
    pub signed_timestamp: i64,
    /// Signature over the canonical form.
    #[prost(bytes = "vec", tag = "4")]
    pub signature: Vec<u8>,
    /// Signature scheme tag ("ed25519" or "sr25519").
    ///
    /// Protocol-level only: not part of the canonical form.
    #[prost(string, tag = "5")]
    pub sign_type: String,
}

/// The canonical form a batch signature commits to.
///
/// No signature field, votes pre-sorted, chain id included so a batch signed
/// for one network cannot be replayed on another.
#[derive(Clone, PartialEq, Message)]
pub struct CanonicalGossipVote {
    #[prost(bytes = "vec", tag = "1")]
    pub pub_key: Vec<u8>,
    #[prost(message, repeated, tag = "2")]
    pub votes: Vec<Vote>,
    #[prost(int64, tag = "3")]
    pub signed_timestamp: i64,
    #[prost(string, tag = "4")]
    pub chain_id: String,
}

/// The wire-contract total order over votes:
/// `(oracle_id ASC, timestamp ASC, data ASC)`.
pub fn vote_cmp(a: &Vote, b: &Vote) -> Ordering {
    a.oracle_id
        .cmp(&b.oracle_id)
        .then_with(|| a.timestamp.cmp(&b.timestamp))
        .then_with(|| a.data.cmp(&b.data))
}

/// Sort votes into the wire-contract order.
///
/// Signer and verifiers must apply this identically or signatures will not
/// reproduce.
pub fn sort_votes(votes: &mut [Vote]) {
    votes.sort_by(vote_cmp);
}

/// The byte string a batch signature is computed over.
///
/// Assumes `batch.votes` is already in contract order. `sign_type` is
/// deliberately absent from the canonical form (wire compatibility with the
/// deployed protocol).
pub fn sign_bytes(batch: &GossipVote, chain_id: &str) -> Vec<u8> {
    let canonical = CanonicalGossipVote {
        pub_key: batch.pub_key.clone(),
        votes: batch.votes.clone(),
        signed_timestamp: batch.signed_timestamp,
        chain_id: chain_id.to_string(),
    };
    canonical.encode_to_vec()
}

//! Wire messages for the oracle gossip channel.
//!
//! Messages are length-delimited tag-value encodings compatible with
//! Protocol Buffers v3, written here as hand-maintained `prost` structs so
//! the field layout is visible at the definition site.
//!
//! Two encodings matter:
//!
//! - the **gossip form** ([`GossipVote`]): what travels between peers,
//!   carrying the signature and a `sign_type` scheme tag
//! - the **canonical form** ([`CanonicalGossipVote`]): what signatures are
//!   computed over: votes pre-sorted, no signature field, and the chain id
//!   mixed in to prevent cross-chain replay
//!
//! The vote ordering in [`sort_votes`] is part of the wire contract: signer
//! and verifiers must agree on it byte for byte.

mod codec;
mod messages;

pub use codec::{decode_gossip_vote, encode_gossip_vote, WireError, MAX_GOSSIP_MSG_BYTES};
pub use messages::{sign_bytes, sort_votes, vote_cmp, CanonicalGossipVote, GossipVote, Vote};

//! Encode/decode helpers with the gossip channel's receive cap.

use crate::messages::GossipVote;
use prost::Message;
use thiserror::Error;

/// Per-message receive capacity on the oracle channel (64 KiB).
pub const MAX_GOSSIP_MSG_BYTES: usize = 65536;

/// Wire-level failures.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("message exceeds channel capacity: {got} > {cap} bytes")]
    Oversize { got: usize, cap: usize },

    #[error("malformed message: {0}")]
    Decode(#[from] prost::DecodeError),
}

/// Encode a batch for the wire.
///
/// An oversize batch is a programming error on the sender (the unsigned
/// buffer is pruned well below this), surfaced as an error rather than a
/// truncated send.
pub fn encode_gossip_vote(batch: &GossipVote) -> Result<Vec<u8>, WireError> {
    let buf = batch.encode_to_vec();
    if buf.len() > MAX_GOSSIP_MSG_BYTES {
        return Err(WireError::Oversize {
            got: buf.len(),
            cap: MAX_GOSSIP_MSG_BYTES,
        });
    }
    Ok(buf)
}

/// Decode a batch received from a peer, enforcing the receive cap.
pub fn decode_gossip_vote(buf: &[u8]) -> Result<GossipVote, WireError> {
    if buf.len() > MAX_GOSSIP_MSG_BYTES {
        return Err(WireError::Oversize {
            got: buf.len(),
            cap: MAX_GOSSIP_MSG_BYTES,
        });
    }
    Ok(GossipVote::decode(buf)?)
}

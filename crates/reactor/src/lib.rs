//! The oracle vote aggregation and gossip reactor.
//!
//! Each validator batches its own oracle observations with the outstanding
//! unsigned votes, signs the batch, and streams the resulting per-validator
//! entries to every peer until each honest validator holds a recent signed
//! batch per validator identity. The consensus engine reads the buffer when
//! proposing.
//!
//! # Architecture
//!
//! ```text
//! [Adapters] ─► [Executor] ─► vote channel ─► [VoteSigner]
//!                                                  │
//!                                                  ▼
//!                           [UnsignedVoteBuffer] ──┤
//!                                  │ prune by block time
//!                                  ▼
//!                           [GossipVoteBuffer: addr → signed batch]
//!                                  │            ▲
//!                                  ▼            │ verified ingress
//!                         [per-peer broadcast] ─┴─ [receive]
//! ```
//!
//! The [`Reactor`] owns both buffers, the signing identity, and a supervised
//! group of workers: the job executor, the signer loop, two pruning loops,
//! and one broadcaster per connected peer. One cancellation token stops them
//! all; [`Reactor::stop`] waits for quiescence.

mod broadcast;
mod buffer;
mod config;
mod metrics;
mod peer;
mod prune;
mod reactor;
mod signer;
mod state;

pub use buffer::{BlockTimestampRing, GossipVoteBuffer, InstallOutcome, UnsignedVoteBuffer};
pub use config::OracleConfig;
pub use peer::{
    ChannelDescriptor, Envelope, Peer, PeerSlotError, PeerSlots, MAX_ACTIVE_PEERS,
    ORACLE_CHANNEL_ID, ORACLE_CHANNEL_PRIORITY,
};
pub use reactor::{Reactor, ReactorBuilder, ReactorError, ReceiveError};
pub use state::{ChainStateReader, StaticChainState};

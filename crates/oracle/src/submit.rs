//! The wallet seam: on-chain vote submission.

use async_trait::async_trait;
use thiserror::Error;

/// The on-chain vote message the wallet signs and broadcasts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgCreateVote {
    /// Bech32 address of the submitting account.
    pub creator: String,
    pub oracle_id: String,
    /// Normalized observation time, seconds.
    pub timestamp: i64,
    pub data: String,
}

/// Wallet-side failures.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("wallet unavailable: {0}")]
    Unavailable(String),

    #[error("transaction rejected: {0}")]
    Rejected(String),
}

/// Capability to submit votes through the node's wallet.
///
/// Submission is fire-and-forget from the executor's point of view: the
/// executor spawns the call and records the outcome from the returned
/// result, never blocking an oracle tick on it.
#[async_trait]
pub trait VoteSubmitter: Send + Sync {
    /// The submitting account's address (the `creator` field).
    fn creator(&self) -> String;

    /// Current voting power of the submitting account. Zero-power accounts
    /// skip submission (their votes carry no weight on chain).
    async fn voting_power(&self) -> Result<i64, SubmitError>;

    /// Broadcast one vote.
    async fn submit_vote(&self, msg: MsgCreateVote) -> Result<(), SubmitError>;
}

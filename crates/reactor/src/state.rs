//! Read-only access to consensus state.

use parking_lot::RwLock;
use tidemark_types::ValidatorSet;

/// The slice of the consensus state store the reactor reads.
///
/// Implementations snapshot: the validator set returned is the set at the
/// moment of the call and may be superseded by the next block.
pub trait ChainStateReader: Send + Sync {
    /// Timestamp of the last committed block, seconds.
    fn last_block_time(&self) -> i64;

    /// The current validator set.
    fn validator_set(&self) -> ValidatorSet;
}

/// Fixed chain state with settable block time, for tests and simulation.
pub struct StaticChainState {
    last_block_time: RwLock<i64>,
    validators: RwLock<ValidatorSet>,
}

impl StaticChainState {
    pub fn new(validators: ValidatorSet) -> Self {
        Self {
            last_block_time: RwLock::new(0),
            validators: RwLock::new(validators),
        }
    }

    /// Advance the observed block time.
    pub fn set_last_block_time(&self, t: i64) {
        *self.last_block_time.write() = t;
    }

    /// Swap the validator set.
    pub fn set_validator_set(&self, validators: ValidatorSet) {
        *self.validators.write() = validators;
    }
}

impl ChainStateReader for StaticChainState {
    fn last_block_time(&self) -> i64 {
        *self.last_block_time.read()
    }

    fn validator_set(&self) -> ValidatorSet {
        self.validators.read().clone()
    }
}

//! The validator set: the authoritative list of signing identities.
//!
//! The reactor holds a read-only snapshot of this; the consensus engine owns
//! the live copy and swaps snapshots on validator-set changes.

use crate::crypto::PublicKey;

/// One validator's identity and weight.
#[derive(Debug, Clone)]
pub struct ValidatorInfo {
    /// Upper-hex address (derived from `pub_key`).
    pub address: String,
    /// The validator's consensus public key.
    pub pub_key: PublicKey,
    /// Voting power at the current height.
    pub voting_power: i64,
}

impl ValidatorInfo {
    /// Build an entry from a public key, deriving the address.
    pub fn new(pub_key: PublicKey, voting_power: i64) -> Self {
        Self {
            address: pub_key.address().to_string(),
            pub_key,
            voting_power,
        }
    }
}

/// The validator set for the current height.
///
/// Order is the consensus order; a validator's index in this order is what
/// gossip batches may carry instead of the full key.
#[derive(Debug, Clone, Default)]
pub struct ValidatorSet {
    validators: Vec<ValidatorInfo>,
}

impl ValidatorSet {
    /// Build a set from entries already in consensus order.
    pub fn new(validators: Vec<ValidatorInfo>) -> Self {
        Self { validators }
    }

    /// Look up a validator by upper-hex address.
    ///
    /// Returns the consensus index alongside the entry.
    pub fn get_by_address(&self, address: &str) -> Option<(u32, &ValidatorInfo)> {
        self.validators
            .iter()
            .position(|v| v.address == address)
            .map(|i| (i as u32, &self.validators[i]))
    }

    /// Whether the address belongs to a current validator.
    pub fn has_address(&self, address: &str) -> bool {
        self.validators.iter().any(|v| v.address == address)
    }

    /// All entries in consensus order.
    pub fn validators(&self) -> &[ValidatorInfo] {
        &self.validators
    }

    /// Number of validators.
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

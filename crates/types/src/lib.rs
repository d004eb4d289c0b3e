//! Foundational types for the tidemark oracle sidecar.
//!
//! This crate provides the identity layer used throughout the workspace:
//!
//! - **Signature schemes**: ed25519 and sr25519 behind one [`PublicKey`] /
//!   [`KeyPair`] pair of enums
//! - **Addresses**: short hashes of public keys, the keys of the gossip buffer
//! - **Validator set**: the authoritative list of signing identities
//!
//! # Design Philosophy
//!
//! This crate is self-contained and does not depend on any other workspace
//! crates, making it the foundation layer. The scheme set is closed on
//! purpose: wire messages carry a free-form `sign_type` string, and anything
//! that does not parse into [`SignScheme`] is rejected at the boundary.

mod crypto;
mod validator;

pub use crypto::{Address, CryptoError, KeyPair, PrivValidator, PublicKey, SignScheme};
pub use validator::{ValidatorInfo, ValidatorSet};

//! Signature schemes, public keys, and addresses.
//!
//! Two schemes are supported: ed25519 (Edwards curve, single point) and
//! sr25519 (Ristretto / Schnorr). Both produce 32-byte public keys and
//! 64-byte signatures, so the wire layer carries raw bytes plus a scheme tag
//! and this module does the interpretation.

use ed25519_dalek::Verifier;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Context string mixed into sr25519 signatures.
///
/// Must match between signer and verifier; schnorrkel refuses signatures
/// produced under a different context.
const SR25519_SIGNING_CONTEXT: &[u8] = b"tidemark-oracle";

/// Number of bytes in an address (truncated SHA-256 of the public key).
pub const ADDRESS_LEN: usize = 20;

/// Errors from key handling and signing.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("unsupported sign type: {0:?}")]
    UnsupportedScheme(String),

    #[error("invalid public key bytes")]
    InvalidPublicKey,

    #[error("invalid signature bytes")]
    InvalidSignature,

    #[error("signing failed: {0}")]
    SigningFailed(String),
}

/// The closed set of signature schemes understood by the gossip protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignScheme {
    /// Edwards curve single-point scheme.
    Ed25519,
    /// Ristretto / Schnorr scheme.
    Sr25519,
}

impl SignScheme {
    /// The wire tag for this scheme (the `sign_type` field).
    pub fn as_str(&self) -> &'static str {
        match self {
            SignScheme::Ed25519 => "ed25519",
            SignScheme::Sr25519 => "sr25519",
        }
    }

    /// Parse a wire tag. Anything unknown is rejected.
    pub fn parse(s: &str) -> Result<Self, CryptoError> {
        match s {
            "ed25519" => Ok(SignScheme::Ed25519),
            "sr25519" => Ok(SignScheme::Sr25519),
            other => Err(CryptoError::UnsupportedScheme(other.to_string())),
        }
    }
}

impl std::fmt::Display for SignScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validator address: the first 20 bytes of SHA-256 over the raw public
/// key bytes, rendered upper-hex.
///
/// Addresses key the gossip buffer and index into the validator set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// Derive the address for raw public key bytes.
    pub fn from_pub_key_bytes(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&digest[..ADDRESS_LEN]);
        Self(out)
    }

    /// Raw address bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl std::fmt::Display for Address {
    /// Upper-hex, the form used for buffer keys and logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

/// A public key under one of the supported schemes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Ed25519(ed25519_dalek::VerifyingKey),
    Sr25519(schnorrkel::PublicKey),
}

impl PublicKey {
    /// Interpret raw key bytes under the given scheme.
    ///
    /// Validates that the bytes form a point on the respective curve.
    pub fn from_bytes(scheme: SignScheme, bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| CryptoError::InvalidPublicKey)?;
        match scheme {
            SignScheme::Ed25519 => ed25519_dalek::VerifyingKey::from_bytes(&arr)
                .map(PublicKey::Ed25519)
                .map_err(|_| CryptoError::InvalidPublicKey),
            SignScheme::Sr25519 => schnorrkel::PublicKey::from_bytes(&arr)
                .map(PublicKey::Sr25519)
                .map_err(|_| CryptoError::InvalidPublicKey),
        }
    }

    /// The scheme this key belongs to.
    pub fn scheme(&self) -> SignScheme {
        match self {
            PublicKey::Ed25519(_) => SignScheme::Ed25519,
            PublicKey::Sr25519(_) => SignScheme::Sr25519,
        }
    }

    /// Raw key bytes as they travel on the wire.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            PublicKey::Ed25519(pk) => pk.to_bytes().to_vec(),
            PublicKey::Sr25519(pk) => pk.to_bytes().to_vec(),
        }
    }

    /// The address derived from this key.
    pub fn address(&self) -> Address {
        Address::from_pub_key_bytes(&self.to_bytes())
    }

    /// Verify `signature` over `message`.
    ///
    /// Malformed signature bytes verify as false rather than erroring; the
    /// caller treats both the same way (drop the message).
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        match self {
            PublicKey::Ed25519(pk) => {
                let Ok(sig) = ed25519_dalek::Signature::from_slice(signature) else {
                    return false;
                };
                pk.verify(message, &sig).is_ok()
            }
            PublicKey::Sr25519(pk) => {
                let Ok(sig) = schnorrkel::Signature::from_bytes(signature) else {
                    return false;
                };
                let ctx = schnorrkel::signing_context(SR25519_SIGNING_CONTEXT);
                pk.verify(ctx.bytes(message), &sig).is_ok()
            }
        }
    }
}

/// Capability to sign gossip batches as this node's validator identity.
///
/// The production node backs this with its consensus private key; tests use
/// a freshly generated [`KeyPair`].
pub trait PrivValidator: Send + Sync {
    /// The public half of the signing identity.
    fn public_key(&self) -> PublicKey;

    /// Sign `message`, returning the 64-byte signature.
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// An in-process signing key under one of the supported schemes.
pub enum KeyPair {
    Ed25519(ed25519_dalek::SigningKey),
    Sr25519(schnorrkel::Keypair),
}

impl KeyPair {
    /// Generate a fresh keypair for the given scheme.
    pub fn generate(scheme: SignScheme) -> Self {
        let mut rng = rand::rngs::OsRng;
        match scheme {
            SignScheme::Ed25519 => KeyPair::Ed25519(ed25519_dalek::SigningKey::generate(&mut rng)),
            SignScheme::Sr25519 => KeyPair::Sr25519(schnorrkel::Keypair::generate_with(&mut rng)),
        }
    }
}

impl PrivValidator for KeyPair {
    fn public_key(&self) -> PublicKey {
        match self {
            KeyPair::Ed25519(sk) => PublicKey::Ed25519(sk.verifying_key()),
            KeyPair::Sr25519(kp) => PublicKey::Sr25519(kp.public),
        }
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        match self {
            KeyPair::Ed25519(sk) => {
                use ed25519_dalek::Signer;
                Ok(sk.sign(message).to_bytes().to_vec())
            }
            KeyPair::Sr25519(kp) => {
                let ctx = schnorrkel::signing_context(SR25519_SIGNING_CONTEXT);
                Ok(kp.sign(ctx.bytes(message)).to_bytes().to_vec())
            }
        }
    }
}

//! Cryptographic primitives for the Meritnet protocol.
//!
//! The wire contract is deliberately conservative:
//! - RSA-2048 with PKCS#1 v1.5 padding over SHA-256 for all signatures
//! - X.509/SPKI DER as the public key interchange encoding
//! - Base64 (standard alphabet, padded) wherever key or signature
//!   material appears inside JSON
//! - SHA-1 digests of encoded public keys as 160-bit node identities
//!   (see `types::NodeId`)

mod signature;

pub use signature::{
    sign, verify, Keypair, PublicKey, SecretKey, Signature, RSA_KEY_BITS, SIGNATURE_SIZE,
};

use thiserror::Error;

/// Cryptographic errors
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Signature did not verify against the given key and message
    #[error("invalid signature")]
    InvalidSignature,
    /// Invalid public key format
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
    /// Invalid secret key material
    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),
    /// Key generation failed
    #[error("key generation failed: {0}")]
    KeyGeneration(String),
    /// Key encoding failed
    #[error("key encoding failed: {0}")]
    KeyEncoding(String),
    /// A signature or public key was required but not present
    #[error("missing signature or public key")]
    MissingKeyMaterial,
}

/// Result type for crypto operations
pub type CryptoResult<T> = Result<T, CryptoError>;

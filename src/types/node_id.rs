//! 160-bit node identities with XOR distance.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha1::{Digest, Sha1};
use std::fmt;

use crate::crypto::PublicKey;

/// Identity width in bytes (SHA-1 output)
pub const NODE_ID_BYTES: usize = 20;
/// Identity width in bits; also the number of routing buckets
pub const ID_BITS: usize = NODE_ID_BYTES * 8;

/// A 160-bit node identity.
///
/// `NodeId` = SHA-1(SPKI DER of the node's public key). Bootstrap and
/// test identities may instead be derived from an arbitrary seed string.
/// The hex form (40 lowercase chars) is what appears on the wire as a
/// transaction `senderId`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId([u8; NODE_ID_BYTES]);

impl Serialize for NodeId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Self::from_hex(&s).map_err(serde::de::Error::custom)
        } else {
            let bytes = <Vec<u8>>::deserialize(deserializer)?;
            let arr: [u8; NODE_ID_BYTES] = bytes
                .as_slice()
                .try_into()
                .map_err(|_| serde::de::Error::custom("node id must be 20 bytes"))?;
            Ok(Self(arr))
        }
    }
}

impl NodeId {
    /// Create from raw bytes
    #[must_use]
    pub const fn from_bytes(bytes: [u8; NODE_ID_BYTES]) -> Self {
        Self(bytes)
    }

    /// Derive the identity of a public key
    #[must_use]
    pub fn from_public_key(pubkey: &PublicKey) -> Self {
        let digest = Sha1::digest(pubkey.as_bytes());
        Self(digest.into())
    }

    /// Derive an identity from an arbitrary seed string
    #[must_use]
    pub fn from_seed(seed: &str) -> Self {
        let digest = Sha1::digest(seed.as_bytes());
        Self(digest.into())
    }

    /// Get the underlying bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; NODE_ID_BYTES] {
        &self.0
    }

    /// Convert to lowercase hex (40 chars, no prefix)
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string
    ///
    /// # Errors
    /// Returns error if hex is invalid or wrong length
    pub fn from_hex(s: &str) -> Result<Self, NodeIdError> {
        let bytes = hex::decode(s).map_err(|_| NodeIdError::InvalidHex)?;

        let arr: [u8; NODE_ID_BYTES] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| NodeIdError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }

    /// XOR distance to another identity
    #[must_use]
    pub fn distance(&self, other: &Self) -> [u8; NODE_ID_BYTES] {
        let mut out = [0u8; NODE_ID_BYTES];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = self.0[i] ^ other.0[i];
        }
        out
    }

    /// Routing bucket for another identity, as seen from this one.
    ///
    /// The bucket is the zero-based position of the distance's highest
    /// set bit, so bucket 159 holds the far half of the id space and
    /// bucket 0 holds ids differing only in the lowest bit. Returns
    /// `None` when the identities are equal (zero distance has no
    /// highest bit).
    #[must_use]
    pub fn bucket_index(&self, other: &Self) -> Option<usize> {
        let distance = self.distance(other);
        for (i, byte) in distance.iter().enumerate() {
            if *byte != 0 {
                let bits_below = (NODE_ID_BYTES - 1 - i) * 8;
                let top = 7 - byte.leading_zeros() as usize;
                return Some(bits_below + top);
            }
        }
        None
    }

    /// XOR distance as an approximate magnitude, for blending with
    /// trust scores. The conversion keeps the top ~53 bits, which is
    /// plenty to order candidates at routing scale.
    #[must_use]
    pub fn distance_metric(&self, other: &Self) -> f64 {
        self.distance(other)
            .iter()
            .fold(0.0, |acc, &b| acc * 256.0 + f64::from(b))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.to_hex())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Node id parsing errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum NodeIdError {
    /// Invalid hex encoding
    #[error("invalid hex encoding")]
    InvalidHex,
    /// Invalid id length
    #[error("invalid node id length: expected 20 bytes, got {0}")]
    InvalidLength(usize),
}

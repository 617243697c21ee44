//! Signed transactions carried inside blocks.

use serde::{Deserialize, Serialize};

use super::{now_millis, Timestamp};
use crate::crypto::{self, CryptoError, CryptoResult, Keypair, PublicKey, Signature};

/// A signed statement from one participant.
///
/// The signed message is the exact concatenation
/// `senderId + payload + timestamp` (timestamp in decimal), so any
/// implementation can reproduce it without canonicalizing JSON first.
/// The JSON field names and their order below are part of the wire
/// contract: block hashing covers the serialized transaction list.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Hex node identity of the sender
    pub sender_id: String,
    /// Free-form application payload
    pub payload: String,
    /// Creation time in milliseconds since the Unix epoch
    pub timestamp: Timestamp,
    /// RSA signature over the signing message
    pub signature: Signature,
    /// Sender's trust score at creation time, informational for
    /// everything except Proof-of-Reputation block validation
    pub trust_score: f64,
    /// Sender's public key; absent until the transaction is finalized
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub public_key: Option<PublicKey>,
}

impl Transaction {
    /// Create a transaction from already-built parts
    #[must_use]
    pub fn new(sender_id: String, payload: String, timestamp: Timestamp, signature: Signature) -> Self {
        Self {
            sender_id,
            payload,
            timestamp,
            signature,
            trust_score: 0.0,
            public_key: None,
        }
    }

    /// Build and sign a transaction in one step.
    ///
    /// The sender id is taken separately from the keypair: settlement
    /// transactions name the auction winner as sender while being
    /// signed (and verifiable) under the settling node's key.
    #[must_use]
    pub fn signed(sender_id: String, payload: String, trust_score: f64, keypair: &Keypair) -> Self {
        Self::signed_at(sender_id, payload, now_millis(), trust_score, keypair)
    }

    /// Like [`Transaction::signed`] with an explicit timestamp, for
    /// events stamped before signing (a bid keeps its placement time)
    #[must_use]
    pub fn signed_at(
        sender_id: String,
        payload: String,
        timestamp: Timestamp,
        trust_score: f64,
        keypair: &Keypair,
    ) -> Self {
        let message = signing_message(&sender_id, &payload, timestamp);
        let signature = keypair.sign(&message);
        Self {
            sender_id,
            payload,
            timestamp,
            signature,
            trust_score,
            public_key: Some(keypair.public_key().clone()),
        }
    }

    /// The exact bytes covered by the signature
    #[must_use]
    pub fn signing_message(&self) -> Vec<u8> {
        signing_message(&self.sender_id, &self.payload, self.timestamp)
    }

    /// Verify the signature against the embedded public key
    ///
    /// # Errors
    /// Returns error if the public key is absent, does not decode, or
    /// the signature does not verify
    pub fn verify(&self) -> CryptoResult<()> {
        let public_key = self
            .public_key
            .as_ref()
            .ok_or(CryptoError::MissingKeyMaterial)?;
        crypto::verify(public_key, &self.signing_message(), &self.signature)
    }

    /// Deduplication identity: `senderId + payload + timestamp`.
    ///
    /// Two transactions with the same identity are the same event and
    /// must influence trust exactly once, no matter how often they are
    /// re-observed.
    #[must_use]
    pub fn identity(&self) -> String {
        format!("{}{}{}", self.sender_id, self.payload, self.timestamp)
    }

    /// Whether two transactions are the same event
    #[must_use]
    pub fn same_identity(&self, other: &Self) -> bool {
        self.sender_id == other.sender_id
            && self.payload == other.payload
            && self.timestamp == other.timestamp
    }
}

fn signing_message(sender_id: &str, payload: &str, timestamp: Timestamp) -> Vec<u8> {
    format!("{sender_id}{payload}{timestamp}").into_bytes()
}

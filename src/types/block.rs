//! Blocks and the canonical encoding that their hashes commit to.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};

use super::{now_millis, Timestamp, Transaction};
use crate::crypto::{self, CryptoError, CryptoResult, Keypair, PublicKey, Signature};

/// `previousHash` value of the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// One link of the chain.
///
/// The block hash is SHA-256 over the canonical byte string
///
/// ```text
/// previousHash + timestamp + nonce + json(transactions)
/// ```
///
/// with the integers in decimal and the transaction list serialized as
/// compact JSON in declaration order. Block signatures cover the same
/// bytes, so producer and validators agree on both without exchanging
/// anything beyond the block itself. The `hash`, `signature`, and
/// `publicKey` fields are deliberately outside the canonical string.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Hash of the preceding block, or `"0"` for genesis
    pub previous_hash: String,
    /// SHA-256 of the canonical encoding, lowercase hex
    pub hash: String,
    /// Creation time in milliseconds since the Unix epoch
    pub timestamp: Timestamp,
    /// Proof-of-work counter; stays 0 under Proof-of-Reputation
    pub nonce: u64,
    /// Payload transactions
    pub transactions: Vec<Transaction>,
    /// Producer signature over the canonical encoding; genesis is unsigned
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub signature: Option<Signature>,
    /// Producer public key
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub public_key: Option<PublicKey>,
}

impl Block {
    /// Create an unsigned, unmined block on top of `previous_hash`
    #[must_use]
    pub fn new(previous_hash: String, transactions: Vec<Transaction>) -> Self {
        let mut block = Self {
            previous_hash,
            hash: String::new(),
            timestamp: now_millis(),
            nonce: 0,
            transactions,
            signature: None,
            public_key: None,
        };
        block.hash = block.compute_hash();
        block
    }

    /// The empty, mined, unsigned block every chain starts from
    #[must_use]
    pub fn genesis() -> Self {
        let mut block = Self::new(GENESIS_PREVIOUS_HASH.to_owned(), Vec::new());
        block.mine(crate::POW_DIFFICULTY);
        block
    }

    /// The canonical bytes that both the hash and the signature commit to
    #[must_use]
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let tx_json = serde_json::to_string(&self.transactions).unwrap_or_default();
        format!(
            "{}{}{}{}",
            self.previous_hash, self.timestamp, self.nonce, tx_json
        )
        .into_bytes()
    }

    /// Recompute the block hash from current contents
    #[must_use]
    pub fn compute_hash(&self) -> String {
        let digest = Sha256::digest(self.canonical_bytes());
        hex::encode(digest)
    }

    /// Whether the stored hash has `difficulty` leading zero hex digits
    #[must_use]
    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        self.hash.starts_with(&"0".repeat(difficulty))
    }

    /// Grind the nonce until the hash meets the difficulty target
    pub fn mine(&mut self, difficulty: usize) {
        self.mine_with_cancel(difficulty, &AtomicBool::new(false));
    }

    /// Grind the nonce, giving up when `cancel` is raised.
    ///
    /// Returns `true` if the target was met, `false` on cancellation.
    /// The flag is checked once per attempt and outranks a lucky first
    /// hash, so a pre-raised cancel never yields a block.
    pub fn mine_with_cancel(&mut self, difficulty: usize, cancel: &AtomicBool) -> bool {
        let target = "0".repeat(difficulty);
        loop {
            if cancel.load(Ordering::Relaxed) {
                return false;
            }
            if self.hash.starts_with(&target) {
                return true;
            }
            self.nonce += 1;
            self.hash = self.compute_hash();
        }
    }

    /// Sign the canonical encoding and attach the producer key
    pub fn sign_with(&mut self, keypair: &Keypair) {
        self.signature = Some(keypair.sign(&self.canonical_bytes()));
        self.public_key = Some(keypair.public_key().clone());
    }

    /// Verify the producer signature over the canonical encoding
    ///
    /// # Errors
    /// Returns error if signature or key are absent, or verification fails
    pub fn verify_signature(&self) -> CryptoResult<()> {
        match (&self.signature, &self.public_key) {
            (Some(signature), Some(public_key)) => {
                crypto::verify(public_key, &self.canonical_bytes(), signature)
            }
            _ => Err(CryptoError::MissingKeyMaterial),
        }
    }
}

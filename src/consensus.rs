//! The two block production disciplines and their validation rules.
//!
//! Every node runs exactly one engine at a time. Proof-of-Work grinds
//! nonces until the hash meets the difficulty target and is the
//! bootstrap default. Proof-of-Reputation skips mining entirely and
//! instead gates on the producer's trust score, so a network of
//! established participants stops burning CPU. The ledger switches
//! between them automatically as trust crosses the threshold (see
//! `ledger::Blockchain::append`).

use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;
use tracing::warn;

use crate::crypto::Keypair;
use crate::ledger::Blockchain;
use crate::types::{Block, Transaction};
use crate::{POW_DIFFICULTY, TRUST_THRESHOLD};

/// Block production discipline
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Consensus {
    /// Hash grinding under a fixed difficulty target
    ProofOfWork,
    /// Immediate production, gated on producer trust
    ProofOfReputation,
}

impl Consensus {
    /// Human-readable engine name, for logs and status output
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ProofOfWork => "Proof-of-Work",
            Self::ProofOfReputation => "Proof-of-Reputation",
        }
    }

    /// Build, seal, and sign the next block on top of the chain tip.
    ///
    /// Under Proof-of-Work this mines to the difficulty target first;
    /// under Proof-of-Reputation the block is signed as-is with a zero
    /// nonce. Production does not validate: the producer's own `append`
    /// is expected to run the full pipeline on the result.
    #[must_use]
    pub fn produce_next(
        self,
        pending: Vec<Transaction>,
        chain: &Blockchain,
        keypair: &Keypair,
    ) -> Block {
        self.produce_with_cancel(pending, chain, keypair, &AtomicBool::new(false))
            .expect("uncancelled production always yields a block")
    }

    /// Like [`Self::produce_next`], but mining abandons the search once
    /// `cancel` is raised and returns `None`. Proof-of-Reputation never
    /// observes the flag since it does no search.
    #[must_use]
    pub fn produce_with_cancel(
        self,
        pending: Vec<Transaction>,
        chain: &Blockchain,
        keypair: &Keypair,
        cancel: &AtomicBool,
    ) -> Option<Block> {
        let mut block = Block::new(chain.tip().hash.clone(), pending);
        if self == Self::ProofOfWork && !block.mine_with_cancel(POW_DIFFICULTY, cancel) {
            return None;
        }
        block.sign_with(keypair);
        Some(block)
    }

    /// Engine-specific acceptance check for a candidate block.
    ///
    /// Shared structural checks (linkage, self-hash, signatures) run in
    /// the append pipeline; failures here mean the block does not meet
    /// this engine's discipline.
    #[must_use]
    pub fn validate(self, block: &Block, chain: &Blockchain) -> bool {
        match self {
            Self::ProofOfWork => Self::validate_pow(block, chain),
            Self::ProofOfReputation => Self::validate_por(block, chain),
        }
    }

    fn validate_pow(block: &Block, chain: &Blockchain) -> bool {
        if block.transactions.is_empty() {
            warn!("rejecting block: no transactions");
            return false;
        }
        if block.hash != block.compute_hash() {
            warn!(hash = %block.hash, "rejecting block: stored hash does not match contents");
            return false;
        }
        if !block.meets_difficulty(POW_DIFFICULTY) {
            warn!(hash = %block.hash, "rejecting block: difficulty target not met");
            return false;
        }
        if block.previous_hash != chain.tip().hash {
            warn!(
                expected = %chain.tip().hash,
                got = %block.previous_hash,
                "rejecting block: not built on current tip"
            );
            return false;
        }
        true
    }

    fn validate_por(block: &Block, chain: &Blockchain) -> bool {
        if block.transactions.is_empty() {
            warn!("rejecting block: no transactions");
            return false;
        }
        let first = &block.transactions[0];
        if first.trust_score < TRUST_THRESHOLD {
            warn!(
                sender = %first.sender_id,
                trust = first.trust_score,
                "rejecting block: producer trust below threshold"
            );
            return false;
        }
        if first.verify().is_err() {
            warn!(sender = %first.sender_id, "rejecting block: producer signature invalid");
            return false;
        }
        if block.previous_hash != chain.tip().hash {
            warn!(
                expected = %chain.tip().hash,
                got = %block.previous_hash,
                "rejecting block: not built on current tip"
            );
            return false;
        }
        true
    }
}

//! Chain state and the seven-step append pipeline.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use super::{ChainStore, StoreError};
use crate::consensus::Consensus;
use crate::crypto::CryptoError;
use crate::reputation::ReputationEngine;
use crate::types::{Block, Transaction, GENESIS_PREVIOUS_HASH};
use crate::TRUST_THRESHOLD;

/// Why a candidate block was refused.
///
/// Variants appear in pipeline order; the first failing step wins, so
/// a block rejected for `Linkage` may well also carry a bad signature.
#[derive(Debug, Error)]
pub enum AppendError {
    /// `previousHash` does not name the current tip
    #[error("block does not extend the current tip")]
    Linkage,
    /// Stored hash differs from the recomputed canonical hash
    #[error("stored hash does not match block contents")]
    HashMismatch,
    /// Producer signature absent or invalid
    #[error("block signature rejected: {0}")]
    BlockSignature(#[source] CryptoError),
    /// Some carried transaction fails its own signature check
    #[error("transaction from {sender} rejected: {source}")]
    TransactionSignature {
        /// Claimed sender of the offending transaction
        sender: String,
        /// Underlying verification failure
        #[source]
        source: CryptoError,
    },
    /// The active consensus engine refused the block
    #[error("{0} validation refused the block")]
    Consensus(&'static str),
    /// The block carries no transactions
    #[error("block carries no transactions")]
    Empty,
}

/// Why a replacement chain was refused
#[derive(Debug, Error)]
pub enum ReplaceError {
    /// Replacement carries no blocks at all
    #[error("replacement chain is empty")]
    Empty,
    /// First block is not a genesis block
    #[error("replacement genesis must have previous hash \"0\"")]
    BadGenesis,
    /// A block does not name its predecessor's hash
    #[error("block {0} does not link to its predecessor")]
    BrokenLinkage(usize),
    /// A block's stored hash does not match its contents
    #[error("block {0} fails its own hash check")]
    HashMismatch(usize),
}

/// The append-only ledger.
///
/// A chain always holds at least the genesis block and carries the
/// currently active consensus engine as part of its state: `append`
/// validates under the active engine and may switch it when a
/// participant's trust crosses the threshold. The switch is
/// prospective only; committed blocks are never revisited.
///
/// `Blockchain` is a plain single-writer structure. Callers that share
/// it across tasks wrap it in a lock (the node runtime uses an
/// `RwLock`), while the trust stores it drives are internally sharded
/// and passed in as shared handles.
pub struct Blockchain {
    blocks: Vec<Block>,
    active: Consensus,
    reputation: Arc<ReputationEngine>,
    store: Option<ChainStore>,
}

impl Blockchain {
    /// Create a fresh chain with a newly mined genesis block, starting
    /// under Proof-of-Work
    #[must_use]
    pub fn new(reputation: Arc<ReputationEngine>) -> Self {
        let genesis = Block::genesis();
        info!(hash = %genesis.hash, "ledger initialized at genesis");
        Self {
            blocks: vec![genesis],
            active: Consensus::ProofOfWork,
            reputation,
            store: None,
        }
    }

    /// Create a chain backed by a snapshot store, restoring any
    /// previously saved blocks.
    ///
    /// The snapshot is our own trusted state and is not re-validated
    /// here; foreign chains arrive through [`Self::replace_chain`],
    /// which is.
    ///
    /// # Errors
    /// Returns error if an existing snapshot cannot be read or parsed
    pub fn with_store(
        reputation: Arc<ReputationEngine>,
        store: ChainStore,
    ) -> Result<Self, StoreError> {
        let restored = store.load()?.filter(|blocks| !blocks.is_empty());
        let chain = match restored {
            Some(blocks) => {
                info!(
                    blocks = blocks.len(),
                    path = %store.path().display(),
                    "ledger restored from snapshot"
                );
                Self {
                    blocks,
                    active: Consensus::ProofOfWork,
                    reputation,
                    store: Some(store),
                }
            }
            None => {
                let mut chain = Self::new(reputation);
                chain.store = Some(store);
                chain
            }
        };
        chain.persist();
        Ok(chain)
    }

    /// The newest block
    #[must_use]
    pub fn tip(&self) -> &Block {
        self.blocks.last().expect("chain always holds genesis")
    }

    /// All blocks, oldest first
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Chain height including genesis
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false; kept for API symmetry with `len`
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The engine blocks are currently validated under
    #[must_use]
    pub fn active_consensus(&self) -> Consensus {
        self.active
    }

    /// Manually override the active engine
    pub fn set_consensus(&mut self, engine: Consensus) {
        if engine != self.active {
            info!(from = self.active.name(), to = engine.name(), "consensus switched");
            self.active = engine;
        }
    }

    /// Whether a block with this hash is already on the chain
    #[must_use]
    pub fn contains_block(&self, hash: &str) -> bool {
        self.blocks.iter().any(|block| block.hash == hash)
    }

    /// Whether any committed transaction shares this one's identity
    #[must_use]
    pub fn contains_transaction(&self, tx: &Transaction) -> bool {
        self.blocks
            .iter()
            .flat_map(|block| &block.transactions)
            .any(|committed| committed.same_identity(tx))
    }

    /// Validate a candidate block and commit it to the chain.
    ///
    /// The pipeline runs in a fixed order: linkage, self-hash, block
    /// signature, per-transaction signatures, active-engine validation,
    /// and the non-empty rule; only then is the block committed. After
    /// commit, each not-yet-processed transaction rewards its sender
    /// once and may flip the active engine for future blocks:
    /// Proof-of-Work hands over to Proof-of-Reputation when the updated
    /// score reaches the threshold, and the reverse demotion applies
    /// when it falls back below.
    ///
    /// # Errors
    /// Returns the first pipeline step that refused the block
    pub fn append(&mut self, block: Block) -> Result<(), AppendError> {
        if block.previous_hash != self.tip().hash {
            warn!(
                expected = %self.tip().hash,
                got = %block.previous_hash,
                "append refused: linkage"
            );
            return Err(AppendError::Linkage);
        }
        if block.hash != block.compute_hash() {
            warn!(hash = %block.hash, "append refused: hash mismatch");
            return Err(AppendError::HashMismatch);
        }
        block.verify_signature().map_err(AppendError::BlockSignature)?;
        for tx in &block.transactions {
            tx.verify().map_err(|source| AppendError::TransactionSignature {
                sender: tx.sender_id.clone(),
                source,
            })?;
        }
        let active = self.active;
        if !active.validate(&block, self) {
            return Err(AppendError::Consensus(active.name()));
        }
        if block.transactions.is_empty() {
            return Err(AppendError::Empty);
        }

        let outcomes: Vec<(String, String)> = block
            .transactions
            .iter()
            .map(|tx| (tx.sender_id.clone(), tx.identity()))
            .collect();

        info!(
            height = self.blocks.len(),
            hash = %block.hash,
            engine = active.name(),
            transactions = block.transactions.len(),
            "block committed"
        );
        self.blocks.push(block);
        self.persist();

        for (sender, identity) in outcomes {
            if self.reputation.is_processed(&identity) {
                continue;
            }
            let updated = self.reputation.register_success(&sender);
            self.reputation.mark_processed(identity);
            self.apply_trust_switch(&sender, updated);
        }
        Ok(())
    }

    /// Adopt a replacement chain wholesale, as received from a peer.
    ///
    /// The candidate must be structurally sound: non-empty, rooted at a
    /// genesis block, internally linked, and with every stored hash
    /// matching its contents. Signatures are not re-verified here; each
    /// block passed the full pipeline on whichever node committed it,
    /// and the hash checks pin the bytes. Adoption policy (when to
    /// prefer a foreign chain at all) belongs to the sync layer, not
    /// the ledger. Neither trust scores nor the active engine are
    /// touched: already-processed identities stay processed, so a
    /// rebuild never double-counts.
    ///
    /// # Errors
    /// Returns the first structural defect found
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> Result<(), ReplaceError> {
        if candidate.is_empty() {
            return Err(ReplaceError::Empty);
        }
        if candidate[0].previous_hash != GENESIS_PREVIOUS_HASH {
            return Err(ReplaceError::BadGenesis);
        }
        for (index, block) in candidate.iter().enumerate() {
            if block.hash != block.compute_hash() {
                warn!(index, "replacement refused: hash mismatch");
                return Err(ReplaceError::HashMismatch(index));
            }
            if index > 0 && block.previous_hash != candidate[index - 1].hash {
                warn!(index, "replacement refused: broken linkage");
                return Err(ReplaceError::BrokenLinkage(index));
            }
        }

        info!(
            old_height = self.blocks.len(),
            new_height = candidate.len(),
            "adopting replacement chain"
        );
        self.blocks = candidate;
        self.persist();
        Ok(())
    }

    fn apply_trust_switch(&mut self, participant: &str, score: f64) {
        match self.active {
            Consensus::ProofOfWork if score >= TRUST_THRESHOLD => {
                info!(
                    participant,
                    score, "trust reached threshold, switching to Proof-of-Reputation"
                );
                self.active = Consensus::ProofOfReputation;
            }
            Consensus::ProofOfReputation if score < TRUST_THRESHOLD => {
                info!(
                    participant,
                    score, "trust fell below threshold, switching back to Proof-of-Work"
                );
                self.active = Consensus::ProofOfWork;
            }
            _ => {}
        }
    }

    fn persist(&self) {
        if let Some(store) = &self.store {
            if let Err(error) = store.save(&self.blocks) {
                warn!(%error, "failed to persist chain snapshot");
            }
        }
    }
}

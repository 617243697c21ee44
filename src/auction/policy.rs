//! The reputation schedule applied around auction outcomes.
//!
//! Magnitudes are policy, not protocol: nodes may tune them in their
//! config without breaking consensus, since only the resulting scores
//! ever cross the wire. The defaults reward good behavior more
//! generously (and punish bad behavior harder) under
//! Proof-of-Reputation, where trust is the thing actually at stake.

use serde::{Deserialize, Serialize};

use crate::consensus::Consensus;

/// A reputation adjustment whose magnitude depends on the engine that
/// was active when the behavior was observed
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    /// Magnitude under Proof-of-Reputation
    pub por: f64,
    /// Magnitude under Proof-of-Work
    pub pow: f64,
}

impl Adjustment {
    const fn new(por: f64, pow: f64) -> Self {
        Self { por, pow }
    }

    /// The magnitude to apply under `engine`
    #[must_use]
    pub fn amount(self, engine: Consensus) -> f64 {
        match engine {
            Consensus::ProofOfReputation => self.por,
            Consensus::ProofOfWork => self.pow,
        }
    }
}

/// The full schedule of auction-driven reputation adjustments
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PenaltyPolicy {
    /// Seller reward for listing an item
    #[serde(default = "default_listing_bonus")]
    pub listing_bonus: Adjustment,
    /// Bidding on an auction nobody has heard of
    #[serde(default = "default_unknown_auction")]
    pub unknown_auction: Adjustment,
    /// Bidding on an auction that already closed
    #[serde(default = "default_closed_auction")]
    pub closed_auction: Adjustment,
    /// Bidding at or below the current highest amount
    #[serde(default = "default_low_bid")]
    pub low_bid: Adjustment,
    /// Relaying a block the ledger refuses
    #[serde(default = "default_invalid_block")]
    pub invalid_block: Adjustment,
    /// Submitting a transaction whose block fails consensus validation
    #[serde(default = "default_rejected_block")]
    pub rejected_block: Adjustment,
    /// Submitting a transaction with a signature that does not verify.
    /// Flat: forging is equally severe under either engine.
    #[serde(default = "default_forged_signature")]
    pub forged_signature: f64,
}

fn default_listing_bonus() -> Adjustment {
    Adjustment::new(0.05, 0.02)
}

fn default_unknown_auction() -> Adjustment {
    Adjustment::new(0.10, 0.03)
}

fn default_closed_auction() -> Adjustment {
    Adjustment::new(0.08, 0.02)
}

fn default_low_bid() -> Adjustment {
    Adjustment::new(0.10, 0.02)
}

fn default_invalid_block() -> Adjustment {
    Adjustment::new(0.10, 0.02)
}

fn default_rejected_block() -> Adjustment {
    Adjustment::new(0.10, 0.03)
}

fn default_forged_signature() -> f64 {
    0.15
}

impl Default for PenaltyPolicy {
    fn default() -> Self {
        Self {
            listing_bonus: default_listing_bonus(),
            unknown_auction: default_unknown_auction(),
            closed_auction: default_closed_auction(),
            low_bid: default_low_bid(),
            invalid_block: default_invalid_block(),
            rejected_block: default_rejected_block(),
            forged_signature: default_forged_signature(),
        }
    }
}

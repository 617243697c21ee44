//! Auction lifecycle on top of the ledger.
//!
//! Auctions are the workload this chain settles: sellers list items,
//! bidders race each other with signed bid transactions, and closing
//! an auction commits the winning bid as a settlement block. Every
//! outcome feeds reputation through the [`PenaltyPolicy`] schedule, so
//! behaving well here is what eventually moves a node from
//! Proof-of-Work to Proof-of-Reputation.

mod manager;
mod policy;

pub use manager::AuctionManager;
pub use policy::{Adjustment, PenaltyPolicy};

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::AppendError;
use crate::types::{now_millis, Timestamp};

/// A bid on an open auction
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    /// Auction this bid targets
    pub auction_id: String,
    /// Hex node identity of the bidder
    pub bidder_id: String,
    /// Offered amount
    pub amount: f64,
    /// Placement time in milliseconds since the Unix epoch
    pub timestamp: Timestamp,
    /// Bidder's trust score at placement time
    pub trust_score: f64,
}

impl Bid {
    /// Create a bid stamped with the current time
    #[must_use]
    pub fn new(
        auction_id: impl Into<String>,
        bidder_id: impl Into<String>,
        amount: f64,
        trust_score: f64,
    ) -> Self {
        Self {
            auction_id: auction_id.into(),
            bidder_id: bidder_id.into(),
            amount,
            timestamp: now_millis(),
            trust_score,
        }
    }
}

/// A listed item and the bids placed on it
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Auction {
    /// Listing identifier, chosen by the seller
    pub auction_id: String,
    /// What is being sold
    pub item_name: String,
    /// Floor price; the first bid must exceed it
    pub min_bid: f64,
    /// Hex node identity of the seller
    pub seller_id: String,
    /// Accepted bids, in placement order
    #[serde(default)]
    pub bids: Vec<Bid>,
    /// Whether the auction has been closed
    #[serde(default)]
    pub finished: bool,
}

impl Auction {
    /// Create a fresh, open listing
    #[must_use]
    pub fn new(
        auction_id: impl Into<String>,
        item_name: impl Into<String>,
        min_bid: f64,
        seller_id: impl Into<String>,
    ) -> Self {
        Self {
            auction_id: auction_id.into(),
            item_name: item_name.into(),
            min_bid,
            seller_id: seller_id.into(),
            bids: Vec::new(),
            finished: false,
        }
    }

    /// The amount a new bid must exceed: the highest accepted bid, or
    /// the floor price while there are none
    #[must_use]
    pub fn highest_amount(&self) -> f64 {
        self.bids
            .iter()
            .map(|bid| bid.amount)
            .fold(self.min_bid, f64::max)
    }

    /// The highest accepted bid, if any were placed
    #[must_use]
    pub fn winning_bid(&self) -> Option<&Bid> {
        self.bids.iter().max_by(|a, b| {
            a.amount.partial_cmp(&b.amount).unwrap_or(Ordering::Equal)
        })
    }
}

/// Why an auction operation was refused
#[derive(Debug, Error)]
pub enum AuctionError {
    /// No auction is known under this id
    #[error("auction {0} not found")]
    NotFound(String),
    /// The auction has already been closed
    #[error("auction {0} is closed")]
    Closed(String),
    /// Only the listing seller may close an auction
    #[error("auction {0} can only be closed by its seller")]
    NotSeller(String),
    /// The offered amount does not beat the current highest
    #[error("bid of {amount:.2} does not beat the current {highest:.2}")]
    BidTooLow {
        /// Offered amount
        amount: f64,
        /// Amount it had to exceed
        highest: f64,
    },
    /// An inbound transaction failed its signature check
    #[error("transaction from {0} carries an invalid signature")]
    ForgedSignature(String),
    /// The ledger refused the produced block
    #[error("settlement rejected: {0}")]
    Rejected(#[from] AppendError),
}

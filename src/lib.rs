//! # Meritnet Protocol
//!
//! A trust-weighted dual-consensus ledger for peer-to-peer auctions.
//!
//! ## Architecture
//!
//! Four layers cooperate to settle auctions without a broker:
//! - **Ledger**: an append-only replicated chain with a strict
//!   validation pipeline; every commit moves reputation
//! - **Consensus**: Proof-of-Work bootstraps the network, and nodes
//!   that earn enough trust switch to Proof-of-Reputation and stop
//!   mining
//! - **Reputation**: per-participant scores on the ledger side, plus a
//!   decaying interaction record on the peer side
//! - **Routing**: Kademlia-style buckets ranked by a distance/trust
//!   blend, behind an admission policy
//!
//! ## Security Model
//!
//! - Trust is earned through committed blocks, never merely claimed
//! - Per-transaction idempotence keeps gossip echoes from
//!   double-counting reputation
//! - Address caps and endpoint-conflict checks resist eclipse and
//!   spoofing attempts

#![forbid(unsafe_code)]
#![deny(clippy::all, rust_2018_idioms)]
#![warn(clippy::pedantic, clippy::nursery, missing_docs)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::future_not_send,
    clippy::too_many_lines,
    clippy::too_many_arguments,
    // Intentional numeric casts - trust scores and timing are bounded
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_lossless,
    // Const fn not always beneficial for complex types
    clippy::missing_const_for_fn,
    // Self methods kept for API consistency even if unused
    clippy::unused_self,
    // must_use on every fn is excessive
    clippy::must_use_candidate,
    // Pass by value is fine for small Copy types
    clippy::needless_pass_by_value,
    // Field naming matches domain terminology
    clippy::struct_field_names,
    // Match arms with same body are sometimes clearer separate
    clippy::match_same_arms
)]

pub mod auction;
pub mod config;
pub mod consensus;
pub mod crypto;
pub mod ledger;
pub mod reputation;
pub mod routing;
pub mod types;

pub use auction::{Auction, AuctionError, AuctionManager, Bid, PenaltyPolicy};
pub use config::{ConfigError, NodeConfig, PeerEntry};
pub use consensus::Consensus;
pub use crypto::{Keypair, PublicKey, SecretKey, Signature};
pub use ledger::{AppendError, Blockchain, ChainStore};
pub use reputation::{DecayingTrust, ReputationEngine};
pub use routing::{PeerContact, PeerDirectory, RoutingTable};
pub use types::{Block, NodeId, Transaction};

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Leading zero hex digits a mined block hash must carry
pub const POW_DIFFICULTY: usize = 4;

/// Score at and above which a participant may produce blocks under
/// Proof-of-Reputation, and at which a node switches engines
pub const TRUST_THRESHOLD: f64 = 0.7;

/// Score assumed for participants the ledger has never seen
pub const NEUTRAL_TRUST: f64 = 0.5;

/// Step applied per reputation event unless a policy says otherwise
pub const DEFAULT_TRUST_DELTA: f64 = 0.05;

/// How long a peer interaction keeps its full weight (24 hours)
pub const TRUST_DECAY_WINDOW_MS: i64 = 24 * 60 * 60 * 1000;

/// Fraction of a peer score that survives at the end of the window
pub const TRUST_DECAY_FLOOR: f64 = 0.1;

/// Contacts kept per routing bucket
pub const BUCKET_CAPACITY: usize = 20;

/// Weight of XOR distance against inverse trust when ranking peers
pub const DISTANCE_WEIGHT: f64 = 0.65;

/// Decayed score below which a peer is refused admission
pub const MIN_ADMISSION_TRUST: f64 = 0.2;

/// Identities a single IP address may back at once
pub const MAX_PEERS_PER_ADDRESS: usize = 3;

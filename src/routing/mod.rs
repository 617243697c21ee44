//! Trust-weighted peer routing.
//!
//! A Kademlia-style table of 160 buckets keyed by XOR distance from
//! the local identity, with two departures from the textbook: lookup
//! order blends distance with peer trust, and a policy layer
//! ([`PeerDirectory`]) gates admission to resist Sybil flooding,
//! eclipse attempts, and identity spoofing.

mod directory;
mod peer;
mod table;

pub use directory::{AdmitError, PeerDirectory};
pub use peer::PeerContact;
pub use table::RoutingTable;

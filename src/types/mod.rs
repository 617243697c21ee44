//! Core record types shared by the ledger, consensus, and routing layers.

mod block;
mod node_id;
mod transaction;

pub use block::{Block, GENESIS_PREVIOUS_HASH};
pub use node_id::{NodeId, NodeIdError, ID_BITS, NODE_ID_BYTES};
pub use transaction::Transaction;

/// Milliseconds since the Unix epoch
pub type Timestamp = i64;

/// Current wall-clock time in milliseconds since the Unix epoch
#[must_use]
pub fn now_millis() -> Timestamp {
    chrono::Utc::now().timestamp_millis()
}

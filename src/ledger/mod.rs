//! The replicated ledger: chain state, the append pipeline, and
//! snapshot persistence.

mod chain;
mod storage;

pub use chain::{AppendError, Blockchain, ReplaceError};
pub use storage::{ChainStore, StoreError, CHAIN_FILE};

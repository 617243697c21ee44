//! Chain persistence as a single JSON snapshot.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::types::Block;

/// Default snapshot file name inside a node's data directory
pub const CHAIN_FILE: &str = "blockchain.json";

/// Snapshot persistence errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem error while reading or writing the snapshot
    #[error("chain snapshot io: {0}")]
    Io(#[from] std::io::Error),
    /// Snapshot exists but does not parse as a block list
    #[error("corrupt chain snapshot: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Writes and reads the whole chain as pretty-printed JSON.
///
/// The snapshot is small at this protocol's scale, so a full rewrite
/// per commit is cheaper than being clever. Writes go through a
/// temporary file and a rename, so a crash mid-write leaves the old
/// snapshot intact instead of a truncated one.
pub struct ChainStore {
    path: PathBuf,
}

impl ChainStore {
    /// Create a store backed by an explicit file path
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a store at the conventional file name inside `dir`
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(CHAIN_FILE))
    }

    /// The snapshot file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the chain, replacing any previous snapshot
    ///
    /// # Errors
    /// Returns error if serialization or the filesystem fails
    pub fn save(&self, blocks: &[Block]) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(blocks)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), blocks = blocks.len(), "chain snapshot written");
        Ok(())
    }

    /// Read a previously saved chain.
    ///
    /// A missing file is a normal first start and reports `Ok(None)`;
    /// an unreadable or unparsable file is an error, since silently
    /// restarting from genesis would discard history.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(&self) -> Result<Option<Vec<Block>>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&self.path)?;
        let blocks = serde_json::from_str(&json)?;
        Ok(Some(blocks))
    }
}

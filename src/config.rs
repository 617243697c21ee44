//! TOML configuration for the node runtime.
//!
//! Every field has a default, so an empty file (or no file at all) is
//! a valid configuration. Bootstrap peers are kept as plain strings
//! here and parsed at admission time, so one bad entry costs a warning
//! instead of the whole config.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auction::PenaltyPolicy;
use crate::consensus::Consensus;

/// Why a configuration could not be loaded or saved
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing the file failed
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid TOML for this schema
    #[error("config parse error: {0}")]
    Parse(String),
}

/// A bootstrap peer as written in the config file
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeerEntry {
    /// Hex node identity
    pub id: String,
    /// IP address
    pub host: String,
    /// Listening port
    pub port: u16,
}

/// Node runtime configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Port the node listens on
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Where the chain snapshot and keys live
    /// (default: `~/.meritnet`)
    pub data_dir: Option<PathBuf>,
    /// Private key file (default: `<data_dir>/identity.pem`)
    pub key_file: Option<PathBuf>,
    /// How often queued transactions are drained into a block
    #[serde(default = "default_mining_interval_ms")]
    pub mining_interval_ms: u64,
    /// Engine the node starts under
    #[serde(default = "default_initial_consensus")]
    pub initial_consensus: Consensus,
    /// Peers contacted at startup
    #[serde(default)]
    pub bootstrap_peers: Vec<PeerEntry>,
    /// Reputation schedule overrides
    #[serde(default)]
    pub penalties: PenaltyPolicy,
}

fn default_listen_port() -> u16 {
    9000
}

fn default_mining_interval_ms() -> u64 {
    5_000
}

fn default_initial_consensus() -> Consensus {
    Consensus::ProofOfWork
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            data_dir: None,
            key_file: None,
            mining_interval_ms: default_mining_interval_ms(),
            initial_consensus: default_initial_consensus(),
            bootstrap_peers: Vec::new(),
            penalties: PenaltyPolicy::default(),
        }
    }
}

impl NodeConfig {
    /// Load from a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save to a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be serialized or written
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

//! Peer contact records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::types::NodeId;

/// How to reach one peer.
///
/// Equality covers id and endpoint together; the routing table treats
/// a contact claiming a known endpoint under a new id as a spoofing
/// attempt, not as an update.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerContact {
    /// The peer's 160-bit identity
    pub id: NodeId,
    /// IP address the peer answers on
    pub host: IpAddr,
    /// UDP/TCP port the peer answers on
    pub port: u16,
}

impl PeerContact {
    /// Create a contact record
    #[must_use]
    pub fn new(id: NodeId, host: IpAddr, port: u16) -> Self {
        Self { id, host, port }
    }

    /// The peer's socket address
    #[must_use]
    pub fn endpoint(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether two contacts claim the same network endpoint
    #[must_use]
    pub fn same_endpoint(&self, other: &Self) -> bool {
        self.host == other.host && self.port == other.port
    }
}

impl fmt::Display for PeerContact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.endpoint())
    }
}

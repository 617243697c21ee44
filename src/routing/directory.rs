//! Admission policy in front of the routing table.

use std::net::IpAddr;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{info, warn};

use super::{PeerContact, RoutingTable};
use crate::reputation::DecayingTrust;
use crate::types::NodeId;
use crate::{MAX_PEERS_PER_ADDRESS, MIN_ADMISSION_TRUST};

/// Why a peer was refused admission
#[derive(Debug, Error)]
pub enum AdmitError {
    /// Loopback addresses never route anywhere useful
    #[error("loopback addresses are not admissible")]
    Loopback,
    /// Port 0 means "unspecified" and cannot be dialed
    #[error("port 0 is not admissible")]
    InvalidPort,
    /// The address already backs the maximum number of identities
    #[error("address {0} already backs the maximum number of peers")]
    AddressSaturated(IpAddr),
    /// The peer's trust is below the admission threshold
    #[error("peer trust {0:.3} is below the admission threshold")]
    LowTrust(f64),
    /// The peer claims the local node's own identity
    #[error("peer id matches the local node")]
    SelfPeer,
    /// The endpoint is already claimed by a different identity
    #[error("endpoint already claimed by a different identity")]
    EndpointConflict,
}

/// The shared peer service: a routing table behind an admission policy.
///
/// Every new contact passes a gauntlet before touching the table:
/// routable address, dialable port, at most [`MAX_PEERS_PER_ADDRESS`]
/// identities per IP (eclipse resistance), decayed trust at or above
/// [`MIN_ADMISSION_TRUST`] (Sybil resistance), not our own identity,
/// and no endpoint conflict (spoofing resistance). Re-admitting an
/// already known contact just refreshes its recency.
pub struct PeerDirectory {
    local_id: NodeId,
    table: Mutex<RoutingTable>,
    trust: Arc<DecayingTrust>,
}

impl PeerDirectory {
    /// Create a directory around the local identity
    #[must_use]
    pub fn new(local_id: NodeId, trust: Arc<DecayingTrust>) -> Self {
        Self {
            local_id,
            table: Mutex::new(RoutingTable::new(local_id)),
            trust,
        }
    }

    /// Run the admission gauntlet and insert the contact
    ///
    /// # Errors
    /// Returns the first gate the peer failed
    pub fn admit(&self, peer: PeerContact) -> Result<(), AdmitError> {
        if peer.host.is_loopback() {
            warn!(peer = %peer, "admission refused: loopback address");
            return Err(AdmitError::Loopback);
        }
        if peer.port == 0 {
            warn!(peer = %peer, "admission refused: port 0");
            return Err(AdmitError::InvalidPort);
        }

        let mut table = self.table.lock().expect("routing table lock poisoned");
        let same_address = table.iter().filter(|known| known.host == peer.host).count();
        if same_address >= MAX_PEERS_PER_ADDRESS {
            warn!(peer = %peer, "admission refused: address saturated");
            return Err(AdmitError::AddressSaturated(peer.host));
        }
        let score = self.trust.score(&peer.id);
        if score < MIN_ADMISSION_TRUST {
            warn!(peer = %peer, score, "admission refused: trust too low");
            return Err(AdmitError::LowTrust(score));
        }
        if peer.id == self.local_id {
            return Err(AdmitError::SelfPeer);
        }
        if table.has_conflict(&peer) {
            warn!(peer = %peer, "admission refused: endpoint conflict");
            return Err(AdmitError::EndpointConflict);
        }

        info!(peer = %peer, "peer admitted");
        table.update(peer);
        Ok(())
    }

    /// Up to `count` peers near `target`, ranked by the distance/trust
    /// blend
    #[must_use]
    pub fn nearest(&self, target: &NodeId, count: usize) -> Vec<PeerContact> {
        self.table
            .lock()
            .expect("routing table lock poisoned")
            .find_closest(target, count, &self.trust)
    }

    /// Snapshot of all known contacts
    #[must_use]
    pub fn known_peers(&self) -> Vec<PeerContact> {
        self.table
            .lock()
            .expect("routing table lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    /// Number of known contacts
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.lock().expect("routing table lock poisoned").len()
    }

    /// Whether no contacts are known
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

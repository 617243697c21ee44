//! The trust-weighted Kademlia routing table.

use std::collections::VecDeque;

use tracing::{debug, warn};

use super::PeerContact;
use crate::reputation::DecayingTrust;
use crate::types::{NodeId, ID_BITS};
use crate::{BUCKET_CAPACITY, DISTANCE_WEIGHT};

/// Trust below this contributes as if it were this, keeping the blend
/// finite for fully distrusted peers
const TRUST_EPSILON: f64 = 0.01;

/// 160 buckets of up to 20 peers, bucketed by XOR distance from the
/// local identity.
///
/// Buckets are kept in least-recently-seen order: re-observing a known
/// contact moves it to the fresh end, and a full bucket evicts its
/// stalest entry. Candidate ranking for lookups does not use raw
/// distance alone but the blend
///
/// ```text
/// 0.65 * (distance / 2^160) + 0.35 * (1 / max(trust, 0.01))
/// ```
///
/// so that among comparably distant peers, the trustworthy ones are
/// tried first and known-bad ones sink to the bottom. The distance is
/// scaled into `[0, 1)` before blending: raw XOR magnitudes sit near
/// 2^159 for typical ids and would swallow the trust term entirely in
/// f64, leaving lookups distance-only.
pub struct RoutingTable {
    local_id: NodeId,
    buckets: Vec<VecDeque<PeerContact>>,
    bucket_capacity: usize,
}

impl RoutingTable {
    /// Create an empty table around the local identity
    #[must_use]
    pub fn new(local_id: NodeId) -> Self {
        Self {
            local_id,
            buckets: vec![VecDeque::new(); ID_BITS],
            bucket_capacity: BUCKET_CAPACITY,
        }
    }

    /// The identity this table is centered on
    #[must_use]
    pub fn local_id(&self) -> NodeId {
        self.local_id
    }

    /// Insert or refresh a contact. Returns whether the contact is
    /// present afterwards.
    ///
    /// The local node itself and contacts whose endpoint is already
    /// claimed by a different identity are refused.
    pub fn update(&mut self, peer: PeerContact) -> bool {
        if peer.id == self.local_id {
            debug!("ignoring own contact record");
            return false;
        }
        if self.has_conflict(&peer) {
            warn!(peer = %peer, "refusing contact: endpoint claimed by another identity");
            return false;
        }
        let Some(index) = self.local_id.bucket_index(&peer.id) else {
            return false;
        };

        let bucket = &mut self.buckets[index];
        if let Some(position) = bucket.iter().position(|known| known == &peer) {
            // Seen again: move to the fresh end
            bucket.remove(position);
            bucket.push_back(peer);
            return true;
        }
        if bucket.len() >= self.bucket_capacity {
            if let Some(evicted) = bucket.pop_front() {
                debug!(bucket = index, evicted = %evicted, "bucket full, dropping stalest contact");
            }
        }
        bucket.push_back(peer);
        true
    }

    /// Whether some known contact claims this peer's endpoint under a
    /// different identity
    #[must_use]
    pub fn has_conflict(&self, peer: &PeerContact) -> bool {
        self.iter()
            .any(|known| known.same_endpoint(peer) && known.id != peer.id)
    }

    /// Whether this exact contact (id and endpoint) is known
    #[must_use]
    pub fn contains_exact(&self, peer: &PeerContact) -> bool {
        self.iter().any(|known| known == peer)
    }

    /// All known contacts, stalest first within each bucket
    pub fn iter(&self) -> impl Iterator<Item = &PeerContact> {
        self.buckets.iter().flatten()
    }

    /// Number of known contacts
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.iter().map(VecDeque::len).sum()
    }

    /// Whether the table holds no contacts
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(VecDeque::is_empty)
    }

    /// Up to `count` contacts ranked by the distance/trust blend,
    /// best first
    #[must_use]
    pub fn find_closest(
        &self,
        target: &NodeId,
        count: usize,
        trust: &DecayingTrust,
    ) -> Vec<PeerContact> {
        let scale = (ID_BITS as f64).exp2();
        let mut scored: Vec<(f64, &PeerContact)> = self
            .iter()
            .map(|peer| {
                let distance = target.distance_metric(&peer.id) / scale;
                let confidence = trust.score(&peer.id).max(TRUST_EPSILON);
                let blend =
                    DISTANCE_WEIGHT * distance + (1.0 - DISTANCE_WEIGHT) * (1.0 / confidence);
                (blend, peer)
            })
            .collect();
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(count)
            .map(|(_, peer)| peer.clone())
            .collect()
    }
}

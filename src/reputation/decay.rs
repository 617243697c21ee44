//! Peer trust that fades with inactivity.

use dashmap::DashMap;

use crate::types::{now_millis, NodeId, Timestamp};
use crate::{NEUTRAL_TRUST, TRUST_DECAY_FLOOR, TRUST_DECAY_WINDOW_MS};

#[derive(Clone, Copy, Debug)]
struct TrustRecord {
    successes: u32,
    failures: u32,
    last_interaction: Timestamp,
}

impl TrustRecord {
    fn fresh(now: Timestamp) -> Self {
        Self {
            successes: 0,
            failures: 0,
            last_interaction: now,
        }
    }

    /// Laplace-smoothed success rate: `(s + 1) / (s + f + 2)`.
    /// A peer with no history sits at 0.5, and single observations
    /// cannot swing the estimate to an extreme.
    fn base_score(&self) -> f64 {
        (f64::from(self.successes) + 1.0) / (f64::from(self.successes + self.failures) + 2.0)
    }
}

/// Interaction-derived peer trust with time decay.
///
/// Each peer carries success/failure counters and the time of the last
/// interaction. The reported score is the Laplace estimate scaled by a
/// linear decay from 1.0 down to a floor of 0.1 across a 24 hour
/// window. Peers silent for longer than the window are treated as
/// expired and report the neutral default; their counters revive on the
/// next interaction.
pub struct DecayingTrust {
    records: DashMap<NodeId, TrustRecord>,
    window_ms: i64,
}

impl DecayingTrust {
    /// Create an empty store with the standard 24 hour window
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            window_ms: TRUST_DECAY_WINDOW_MS,
        }
    }

    /// Record a successful interaction with a peer
    pub fn record_success(&self, peer: &NodeId) {
        let now = now_millis();
        let mut record = self
            .records
            .entry(*peer)
            .or_insert_with(|| TrustRecord::fresh(now));
        record.successes += 1;
        record.last_interaction = now;
    }

    /// Record a failed interaction with a peer
    pub fn record_failure(&self, peer: &NodeId) {
        let now = now_millis();
        let mut record = self
            .records
            .entry(*peer)
            .or_insert_with(|| TrustRecord::fresh(now));
        record.failures += 1;
        record.last_interaction = now;
    }

    /// Current decayed score for a peer (0.5 when unknown or expired)
    #[must_use]
    pub fn score(&self, peer: &NodeId) -> f64 {
        self.records.get(peer).map_or(NEUTRAL_TRUST, |record| {
            let elapsed = now_millis() - record.last_interaction;
            if elapsed > self.window_ms {
                return NEUTRAL_TRUST;
            }
            // Clamped so a backwards clock jump cannot push a score
            // past the Laplace estimate
            let decay =
                (1.0 - elapsed as f64 / self.window_ms as f64).clamp(TRUST_DECAY_FLOOR, 1.0);
            record.base_score() * decay
        })
    }

    /// Overwrite a peer's score by projecting it onto the counters:
    /// `successes = round(score * 10)`, `failures = 10 - successes`.
    ///
    /// The projection is deliberately coarse. Reading the score back
    /// goes through Laplace smoothing, so `set_score(0.9)` reports
    /// `(9 + 1) / 12 = 0.833`, pulled toward the middle like any other
    /// ten-observation history.
    pub fn set_score(&self, peer: &NodeId, score: f64) {
        let now = now_millis();
        let successes = (score.clamp(0.0, 1.0) * 10.0).round() as u32;
        self.records.insert(
            *peer,
            TrustRecord {
                successes,
                failures: 10 - successes,
                last_interaction: now,
            },
        );
    }

    /// Forget a peer entirely; the next lookup reports neutral
    pub fn reset(&self, peer: &NodeId) {
        self.records.remove(peer);
    }

    /// Number of peers with recorded history
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no peer has recorded history
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for DecayingTrust {
    fn default() -> Self {
        Self::new()
    }
}

//! Ledger-side trust scores.

use dashmap::{DashMap, DashSet};
use tracing::debug;

use crate::{DEFAULT_TRUST_DELTA, NEUTRAL_TRUST};

/// Tuning for ledger-side trust adjustments
#[derive(Clone, Debug)]
pub struct ReputationConfig {
    /// Amount added when a participant's transaction commits
    pub success_delta: f64,
    /// Amount removed when a participant misbehaves
    pub failure_delta: f64,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            success_delta: DEFAULT_TRUST_DELTA,
            failure_delta: DEFAULT_TRUST_DELTA,
        }
    }
}

/// Per-participant trust scores in `[0.0, 1.0]`.
///
/// Unknown participants start at the neutral 0.5. Scores move by small
/// additive steps and saturate at the bounds. The engine also keeps the
/// set of transaction identities that have already influenced trust, so
/// re-observing a committed transaction (gossip echoes, chain rebuilds)
/// never counts twice.
pub struct ReputationEngine {
    config: ReputationConfig,
    scores: DashMap<String, f64>,
    processed: DashSet<String>,
}

impl ReputationEngine {
    /// Create an engine with the given adjustment steps
    #[must_use]
    pub fn new(config: ReputationConfig) -> Self {
        Self {
            config,
            scores: DashMap::new(),
            processed: DashSet::new(),
        }
    }

    /// Current score for a participant (0.5 when unknown)
    #[must_use]
    pub fn trust_score(&self, participant: &str) -> f64 {
        self.scores
            .get(participant)
            .map_or(NEUTRAL_TRUST, |score| *score)
    }

    /// Reward a participant by the configured success step.
    /// Returns the updated score.
    pub fn register_success(&self, participant: &str) -> f64 {
        self.register_success_by(participant, self.config.success_delta)
    }

    /// Reward a participant by an explicit amount. Returns the updated
    /// score, saturated at 1.0.
    pub fn register_success_by(&self, participant: &str, amount: f64) -> f64 {
        let mut entry = self
            .scores
            .entry(participant.to_owned())
            .or_insert(NEUTRAL_TRUST);
        *entry = (*entry + amount).min(1.0);
        let updated = *entry;
        drop(entry);
        debug!(participant, score = updated, "trust increased");
        updated
    }

    /// Penalize a participant by the configured failure step.
    /// Returns the updated score.
    pub fn register_failure(&self, participant: &str) -> f64 {
        self.register_failure_by(participant, self.config.failure_delta)
    }

    /// Penalize a participant by an explicit amount. Returns the
    /// updated score, saturated at 0.0.
    pub fn register_failure_by(&self, participant: &str, amount: f64) -> f64 {
        let mut entry = self
            .scores
            .entry(participant.to_owned())
            .or_insert(NEUTRAL_TRUST);
        *entry = (*entry - amount).max(0.0);
        let updated = *entry;
        drop(entry);
        debug!(participant, score = updated, "trust decreased");
        updated
    }

    /// Whether a transaction identity has already influenced trust
    #[must_use]
    pub fn is_processed(&self, identity: &str) -> bool {
        self.processed.contains(identity)
    }

    /// Record that a transaction identity has influenced trust
    pub fn mark_processed(&self, identity: String) {
        self.processed.insert(identity);
    }
}

impl Default for ReputationEngine {
    fn default() -> Self {
        Self::new(ReputationConfig::default())
    }
}

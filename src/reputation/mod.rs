//! Reputation tracking.
//!
//! Two stores cooperate here:
//! - [`ReputationEngine`] holds ledger-side scores, moved in small
//!   steps as transactions commit or get rejected
//! - [`DecayingTrust`] holds peer-side scores for routing, derived
//!   from interaction counters and decayed by inactivity
//!
//! Both are keyed per participant and safe to share across tasks.

mod decay;
mod engine;

pub use decay::DecayingTrust;
pub use engine::{ReputationConfig, ReputationEngine};

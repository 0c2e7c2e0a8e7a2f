//! # World Game Governance
//!
//! Gates plan implementation behind weighted voting.
//!
//! ## Vote Weight
//!
//! ```text
//! w = ln(max(population, 1))·0.4 + participation·0.3 + decision_weight·0.3
//! ```
//!
//! ## Approval
//!
//! `for_fraction = weighted_for / total_weighted`, abstentions included in
//! the total. A proposal passes when `for_fraction` reaches its scope's
//! threshold:
//!
//! | Scope | Threshold |
//! |---|---|
//! | Local | 0.50 |
//! | Bioregional | 0.60 |
//! | Continental | 0.70 |
//! | Planetary | 0.75 |

pub mod electorate;
pub mod proposals;
pub mod tally;

pub use electorate::eligible_voters;
pub use proposals::{GovernanceLedger, GovernanceMetrics};
pub use tally::{decide, vote_weight};

use serde::{Deserialize, Serialize};
use worldgame_common::DecisionScope;

/// Approval threshold per scope
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeThresholds {
    pub local: f64,
    pub bioregional: f64,
    pub continental: f64,
    pub planetary: f64,
}

impl ScopeThresholds {
    pub fn for_scope(&self, scope: DecisionScope) -> f64 {
        match scope {
            DecisionScope::Local => self.local,
            DecisionScope::Bioregional => self.bioregional,
            DecisionScope::Continental => self.continental,
            DecisionScope::Planetary => self.planetary,
        }
    }
}

impl Default for ScopeThresholds {
    fn default() -> Self {
        Self {
            local: 0.5,
            bioregional: 0.6,
            continental: 0.7,
            planetary: 0.75,
        }
    }
}

/// Coefficients of a community's ballot weight
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoteWeights {
    /// Applied to `ln(max(population, 1))`
    pub population: f64,
    pub participation: f64,
    pub decision_weight: f64,
}

impl Default for VoteWeights {
    fn default() -> Self {
        Self {
            population: 0.4,
            participation: 0.3,
            decision_weight: 0.3,
        }
    }
}

/// Governance configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    pub thresholds: ScopeThresholds,
    pub vote_weights: VoteWeights,
    /// Voting window of an ordinary proposal, in days
    pub voting_days: u32,
    /// Voting window of an expedited proposal, in days
    pub crisis_voting_days: u32,
    /// Communities taken from each region of a continental electorate
    pub continental_per_region: usize,
    pub continental_max_voters: usize,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            thresholds: ScopeThresholds::default(),
            vote_weights: VoteWeights::default(),
            voting_days: 7,
            crisis_voting_days: 2,
            continental_per_region: 10,
            continental_max_voters: 50,
        }
    }
}

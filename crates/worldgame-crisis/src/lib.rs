//! # World Game Crisis
//!
//! Drives challenges through
//! `Detected → ResponseDrafted → VotingOpen → ResolvedSuccess | ResolvedFailure | Expired`.
//!
//! ## Complexity
//!
//! ```text
//! complexity = 0.6·min(1, regions/10) + 0.4·min(1, mean_path/5)
//! ```
//!
//! Disconnected community pairs count as 10 hops; fewer than two communities
//! give a network term of 0.1.
//!
//! ## Resolution
//!
//! ```text
//! effectiveness       = 0.6·fulfilment + 0.2·participation + 0.2·(1 − severity)
//! success_probability = effectiveness × (1 − 0.3·complexity)
//! ```

pub mod complexity;
pub mod coordinator;
pub mod schedule;

pub use complexity::coordination_complexity;
pub use coordinator::CrisisCoordinator;
pub use schedule::{ChallengeSchedule, ChallengeSpec, ScheduledChallenge};

use serde::{Deserialize, Serialize};

/// Coordination complexity model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplexityConfig {
    pub region_weight: f64,
    /// Region count at which the region term saturates
    pub region_span: f64,
    pub network_weight: f64,
    /// Mean path length at which the network term saturates
    pub path_scale: f64,
    pub disconnected_hops: f64,
    /// Network term when fewer than two communities are involved
    pub isolated_network_term: f64,
}

impl Default for ComplexityConfig {
    fn default() -> Self {
        Self {
            region_weight: 0.6,
            region_span: 10.0,
            network_weight: 0.4,
            path_scale: 5.0,
            disconnected_hops: 10.0,
            isolated_network_term: 0.1,
        }
    }
}

/// Weights of the effectiveness blend
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectivenessWeights {
    pub fulfilment: f64,
    pub participation: f64,
    pub severity_discount: f64,
}

impl Default for EffectivenessWeights {
    fn default() -> Self {
        Self {
            fulfilment: 0.6,
            participation: 0.2,
            severity_discount: 0.2,
        }
    }
}

/// Generated schedule bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub min_challenges: usize,
    pub max_challenges: usize,
    /// Days kept free of challenges at either end of the run
    pub margin_days: u32,
    pub min_regions: usize,
    pub max_regions: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            min_challenges: 3,
            max_challenges: 5,
            margin_days: 30,
            min_regions: 2,
            max_regions: 4,
        }
    }
}

/// Crisis coordinator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrisisConfig {
    pub complexity: ComplexityConfig,
    pub effectiveness: EffectivenessWeights,
    /// Share of success probability lost per unit of complexity
    pub complexity_penalty: f64,
    pub success_threshold: f64,
    pub failure_threshold: f64,
    /// Weight of a response need before resilience and severity scaling
    pub base_need_weight: f64,
    pub schedule: ScheduleConfig,
}

impl Default for CrisisConfig {
    fn default() -> Self {
        Self {
            complexity: ComplexityConfig::default(),
            effectiveness: EffectivenessWeights::default(),
            complexity_penalty: 0.3,
            success_threshold: 0.7,
            failure_threshold: 0.3,
            base_need_weight: 1.0,
            schedule: ScheduleConfig::default(),
        }
    }
}

//! # World Game Allocator
//!
//! Matches supply to demand under sustainability constraints.
//!
//! ## Compatibility
//!
//! ```text
//! compat = 0.3·category_match + 0.25·quality_fit + 0.2·distance_decay
//!        + 0.15·accessibility + 0.1·(1 − environmental_impact)
//! ```
//!
//! ## Ceilings
//!
//! Routine plans keep every resource under
//! `capacity × min(sustainability_threshold, 1 − emergency_reserve)`; crisis
//! plans may reach `capacity × critical_threshold`. A resource already past
//! its critical threshold must come out of the pass strictly lower.
//!
//! ## Strategies
//!
//! - [`Relaxation`]: continuous LP per category
//! - [`PriorityGreedy`]: urgent-first greedy with pro-rata water-fill, also the
//!   fallback whenever another strategy fails

pub mod compatibility;
pub mod optimizer;
pub mod problem;
pub mod scoring;
pub mod strategy;

pub use compatibility::{CompatibilityConfig, CompatibilityModel, CompatibilityWeights};
pub use optimizer::AllocationOptimizer;
pub use problem::{CategoryProblem, CategorySolution, CeilingMode, CeilingPolicy, PlanInputs};
pub use scoring::score_plan;
pub use strategy::greedy::PriorityWeights;
pub use strategy::relaxation::ObjectiveWeights;
pub use strategy::{AllocationStrategy, PriorityGreedy, Relaxation};

use serde::{Deserialize, Serialize};
use worldgame_common::StrategyKind;

/// Optimizer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Primary strategy
    pub strategy: StrategyKind,
    pub objective: ObjectiveWeights,
    pub priority: PriorityWeights,
    /// Urgency level from which a demand is served first
    pub urgent_threshold: u8,
    /// Share of capacity routine plans must leave untouched
    pub emergency_reserve_fraction: f64,
    /// Fraction by which a critical resource's total must fall
    pub critical_correction: f64,
    /// Coverage floor the relaxation enforces for urgent demands
    pub min_coverage: f64,
    pub relaxation_confidence: f64,
    pub greedy_confidence: f64,
    /// Confidence of a plan produced by fallback, capped at 0.4
    pub fallback_confidence: f64,
    /// Pivot budget per category
    pub max_iterations: usize,
    /// Solve categories on the blocking pool
    pub parallel: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Relaxation,
            objective: ObjectiveWeights::default(),
            priority: PriorityWeights::default(),
            urgent_threshold: 7,
            emergency_reserve_fraction: 0.2,
            critical_correction: 0.1,
            min_coverage: 0.0,
            relaxation_confidence: 0.8,
            greedy_confidence: 0.6,
            fallback_confidence: 0.3,
            max_iterations: 10_000,
            parallel: true,
        }
    }
}

//! Allocation plans produced by the optimizer

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::ids::{ChallengeId, Day, NeedId, PlanId, ResourceId};
use crate::ALLOCATION_EPSILON;

/// Purpose of a plan
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    Routine,
    CrisisResponse(ChallengeId),
}

/// Strategy that produced a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    PriorityGreedy,
    Relaxation,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::PriorityGreedy => write!(f, "priority_greedy"),
            StrategyKind::Relaxation => write!(f, "relaxation"),
        }
    }
}

/// Plan quality scores, each in [0, 1] except cost
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlanScores {
    pub satisfaction: f64,
    pub efficiency: f64,
    pub sustainability: f64,
    pub equity: f64,
    /// Weighted blend of the four scores
    pub objective: f64,
    /// Σ quantity × unit cost
    pub implementation_cost: f64,
    /// Allocation-weighted environmental impact
    pub environmental_impact: f64,
}

/// Per-need per-resource quantities plus quality scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub id: PlanId,
    pub kind: PlanKind,
    pub strategy: StrategyKind,

    /// Needs whose allocations this plan replaces when committed
    pub covered_needs: BTreeSet<NeedId>,

    pub quantities: BTreeMap<NeedId, BTreeMap<ResourceId, f64>>,

    pub scores: PlanScores,

    /// Self-reported reliability in [0, 1]
    pub confidence: f64,

    /// Whether a fallback strategy produced the plan
    pub fallback: bool,

    pub created_on: Day,
}

impl AllocationPlan {
    pub fn empty(id: PlanId, kind: PlanKind, strategy: StrategyKind, created_on: Day) -> Self {
        Self {
            id,
            kind,
            strategy,
            covered_needs: BTreeSet::new(),
            quantities: BTreeMap::new(),
            scores: PlanScores::default(),
            confidence: 0.0,
            fallback: false,
            created_on,
        }
    }

    pub fn quantity(&self, need: &NeedId, resource: &ResourceId) -> f64 {
        self.quantities
            .get(need)
            .and_then(|per_resource| per_resource.get(resource))
            .copied()
            .unwrap_or(0.0)
    }

    /// Add to the quantity for one pair, ignoring negligible amounts
    pub fn add(&mut self, need: NeedId, resource: ResourceId, quantity: f64) {
        if quantity <= ALLOCATION_EPSILON {
            return;
        }
        *self
            .quantities
            .entry(need)
            .or_default()
            .entry(resource)
            .or_insert(0.0) += quantity;
    }

    pub fn total_for_resource(&self, resource: &ResourceId) -> f64 {
        self.quantities
            .values()
            .filter_map(|per_resource| per_resource.get(resource))
            .sum()
    }

    pub fn total_for_need(&self, need: &NeedId) -> f64 {
        self.quantities
            .get(need)
            .map(|per_resource| per_resource.values().sum())
            .unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.quantities
            .values()
            .flat_map(|per_resource| per_resource.values())
            .sum()
    }

    pub fn resource_ids(&self) -> BTreeSet<&ResourceId> {
        self.quantities
            .values()
            .flat_map(|per_resource| per_resource.keys())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.total() <= ALLOCATION_EPSILON
    }

    pub fn is_crisis_response(&self) -> bool {
        matches!(self.kind, PlanKind::CrisisResponse(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals() {
        let mut plan = AllocationPlan::empty(PlanId(1), PlanKind::Routine, StrategyKind::PriorityGreedy, 0);
        plan.add(NeedId::new("a"), ResourceId::new("r1"), 300.0);
        plan.add(NeedId::new("b"), ResourceId::new("r1"), 500.0);
        plan.add(NeedId::new("b"), ResourceId::new("r2"), 20.0);
        plan.add(NeedId::new("b"), ResourceId::new("r2"), 0.0);

        assert_eq!(plan.total_for_resource(&ResourceId::new("r1")), 800.0);
        assert_eq!(plan.total_for_need(&NeedId::new("b")), 520.0);
        assert_eq!(plan.total(), 820.0);
        assert_eq!(plan.resource_ids().len(), 2);
        assert_eq!(plan.quantity(&NeedId::new("a"), &ResourceId::new("r2")), 0.0);
    }

    #[test]
    fn test_empty_plan() {
        let plan = AllocationPlan::empty(
            PlanId(2),
            PlanKind::CrisisResponse(ChallengeId::new("c")),
            StrategyKind::Relaxation,
            3,
        );
        assert!(plan.is_empty());
        assert!(plan.is_crisis_response());
    }
}

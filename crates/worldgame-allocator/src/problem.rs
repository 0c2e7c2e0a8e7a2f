//! Per-category allocation problems
//!
//! The ledger view is cut into one independent problem per resource category.
//! Each problem owns its data so it can be solved on any thread.

use std::collections::{BTreeMap, BTreeSet};

use worldgame_common::{
    Day, Need, NeedId, NeedOrigin, PlanKind, Renewability, Resource, ResourceCategory, ResourceId,
    Urgency,
};
use worldgame_ledger::LedgerState;

use crate::compatibility::CompatibilityModel;

/// Capacity ceilings in force for one pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CeilingMode {
    /// `capacity × min(sustainability_threshold, 1 − reserve)`
    Routine { emergency_reserve_fraction: f64 },
    /// `capacity × critical_threshold`
    Crisis,
}

impl CeilingMode {
    /// Total the resource may carry after this pass
    fn cap(&self, resource: &Resource) -> f64 {
        let share = match self {
            CeilingMode::Routine {
                emergency_reserve_fraction,
            } => resource
                .sustainability_threshold
                .min(1.0 - emergency_reserve_fraction),
            CeilingMode::Crisis => resource.critical_threshold,
        };
        resource.total_available * share.max(0.0)
    }
}

/// One resource as seen by a strategy
#[derive(Debug, Clone, PartialEq)]
pub struct SupplyItem {
    pub resource: ResourceId,
    /// Quantity this pass may allocate in total
    pub ceiling: f64,
    pub environmental_impact: f64,
    pub renewability: Renewability,
    pub sustainability_score: f64,
}

/// One need's demand in a single category
#[derive(Debug, Clone, PartialEq)]
pub struct DemandItem {
    pub need: NeedId,
    pub urgency: Urgency,
    pub requirement: f64,
    pub vulnerability: f64,
    pub weight: f64,
    pub prior_satisfaction: f64,
}

/// Independent sub-problem for one resource category
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryProblem {
    pub category: ResourceCategory,
    pub supplies: Vec<SupplyItem>,
    pub demands: Vec<DemandItem>,
    /// Compatibility, indexed `[demand][supply]`
    pub compatibility: Vec<Vec<f64>>,
    /// Unit cost, indexed `[demand][supply]`
    pub cost: Vec<Vec<f64>>,
}

impl CategoryProblem {
    pub fn is_trivial(&self) -> bool {
        self.supplies.is_empty() || self.demands.is_empty()
    }

    /// Share of the category's weighted requirement held by one demand
    pub fn weight_share(&self, demand: usize) -> f64 {
        let total: f64 = self.demands.iter().map(|d| d.weight * d.requirement).sum();
        if total <= 0.0 {
            return 0.0;
        }
        let d = &self.demands[demand];
        d.weight * d.requirement / total
    }
}

/// Quantity moved from one supply to one demand
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Flow {
    pub demand: usize,
    pub supply: usize,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CategorySolution {
    pub flows: Vec<Flow>,
}

impl CategorySolution {
    pub fn supplied(&self, supply: usize) -> f64 {
        self.flows
            .iter()
            .filter(|f| f.supply == supply)
            .map(|f| f.quantity)
            .sum()
    }

    pub fn received(&self, demand: usize) -> f64 {
        self.flows
            .iter()
            .filter(|f| f.demand == demand)
            .map(|f| f.quantity)
            .sum()
    }
}

/// Everything one optimizer pass needs, detached from the ledger
#[derive(Debug, Clone, PartialEq)]
pub struct PlanInputs {
    pub kind: PlanKind,
    pub day: Day,
    /// Needs whose allocations the resulting plan replaces
    pub covered: BTreeSet<NeedId>,
    /// In category order
    pub problems: Vec<CategoryProblem>,
}

/// Ceiling adjustments shared by every problem of a pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CeilingPolicy {
    pub mode: CeilingMode,
    /// Fraction by which a critical resource's total must fall
    pub critical_correction: f64,
}

/// Cut the ledger into per-category problems for the needs `kind` covers
pub fn build_inputs(
    state: &LedgerState,
    kind: &PlanKind,
    policy: CeilingPolicy,
    model: &CompatibilityModel,
) -> PlanInputs {
    let origin = match kind {
        PlanKind::Routine => NeedOrigin::Routine,
        PlanKind::CrisisResponse(challenge) => NeedOrigin::Challenge(challenge.clone()),
    };
    let needs: Vec<&Need> = state.registry.active_needs_from(&origin).collect();
    let covered: BTreeSet<NeedId> = needs.iter().map(|n| n.id.clone()).collect();

    let mut by_category: BTreeMap<ResourceCategory, Vec<&Need>> = BTreeMap::new();
    for need in &needs {
        for (category, quantity) in &need.requirements {
            if *quantity > 0.0 {
                by_category.entry(*category).or_default().push(*need);
            }
        }
    }

    let problems = by_category
        .into_iter()
        .map(|(category, demand_needs)| {
            let resources: Vec<&Resource> = state.resources.by_category(category).collect();
            let supplies = resources
                .iter()
                .map(|r| SupplyItem {
                    resource: r.id.clone(),
                    ceiling: ceiling_for(r, &covered, policy),
                    environmental_impact: r.environmental_impact,
                    renewability: r.renewability,
                    sustainability_score: r.sustainability_score,
                })
                .collect();
            let demands = demand_needs
                .iter()
                .map(|n| DemandItem {
                    need: n.id.clone(),
                    urgency: n.urgency,
                    requirement: n.requirement(category),
                    vulnerability: n.vulnerability,
                    weight: n.weight,
                    prior_satisfaction: n.satisfaction,
                })
                .collect();
            let compatibility = demand_needs
                .iter()
                .map(|n| resources.iter().map(|r| model.score(r, n)).collect())
                .collect();
            let cost = demand_needs
                .iter()
                .map(|n| resources.iter().map(|r| model.unit_cost(r, n)).collect())
                .collect();

            CategoryProblem {
                category,
                supplies,
                demands,
                compatibility,
                cost,
            }
        })
        .collect();

    PlanInputs {
        kind: kind.clone(),
        day: state.day,
        covered,
        problems,
    }
}

/// Quantity the covered needs may hold on `resource` after the pass
fn ceiling_for(resource: &Resource, covered: &BTreeSet<NeedId>, policy: CeilingPolicy) -> f64 {
    let current_total = resource.allocated_total();
    let others: f64 = resource
        .allocations
        .iter()
        .filter(|(need, _)| !covered.contains(*need))
        .map(|(_, q)| q)
        .sum();

    let mut cap = policy.mode.cap(resource);
    if resource.is_critical() {
        cap = cap.min(current_total * (1.0 - policy.critical_correction));
    }
    (cap - others).max(0.0)
}

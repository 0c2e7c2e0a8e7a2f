//! Plan quality scores
//!
//! ```text
//! satisfaction   = Σ urgency·ratio / Σ urgency
//! efficiency     = Σ x·compat/(1 + cost) / Σ x
//! sustainability = Σ x·(1 − impact)·renewability_factor / Σ x   (clamped)
//! equity         = 1 − std(ratio) / mean(ratio)                 (clamped)
//! objective      = Σ weight·score
//! ```

use std::collections::BTreeMap;

use worldgame_common::{NeedId, PlanScores};

use crate::problem::{CategoryProblem, CategorySolution};
use crate::strategy::relaxation::ObjectiveWeights;

#[derive(Default)]
struct NeedProgress {
    urgency: f64,
    required: f64,
    covered: f64,
}

/// Score a set of solved category problems
pub fn score_plan(
    solved: &[(&CategoryProblem, &CategorySolution)],
    weights: &ObjectiveWeights,
) -> PlanScores {
    let mut progress: BTreeMap<&NeedId, NeedProgress> = BTreeMap::new();
    let mut total = 0.0;
    let mut efficiency = 0.0;
    let mut sustainability = 0.0;
    let mut impact = 0.0;
    let mut cost = 0.0;

    for (problem, solution) in solved {
        for (d, demand) in problem.demands.iter().enumerate() {
            let entry = progress.entry(&demand.need).or_default();
            entry.urgency = demand.urgency.level() as f64;
            entry.required += demand.requirement;
            entry.covered += solution.received(d).min(demand.requirement);
        }
        for flow in &solution.flows {
            let supply = &problem.supplies[flow.supply];
            let unit_cost = problem.cost[flow.demand][flow.supply];
            let x = flow.quantity;
            total += x;
            efficiency += x * problem.compatibility[flow.demand][flow.supply] / (1.0 + unit_cost);
            sustainability += x * (1.0 - supply.environmental_impact) * supply.renewability.factor();
            impact += x * supply.environmental_impact;
            cost += x * unit_cost;
        }
    }

    let ratios: Vec<(f64, f64)> = progress
        .values()
        .map(|p| {
            let ratio = if p.required > 0.0 {
                (p.covered / p.required).clamp(0.0, 1.0)
            } else {
                1.0
            };
            (p.urgency, ratio)
        })
        .collect();

    let satisfaction = {
        let weight: f64 = ratios.iter().map(|(u, _)| u).sum();
        if weight > 0.0 {
            ratios.iter().map(|(u, r)| u * r).sum::<f64>() / weight
        } else {
            1.0
        }
    };

    let equity = equity(&ratios.iter().map(|(_, r)| *r).collect::<Vec<_>>());

    let (efficiency, sustainability, impact) = if total > 0.0 {
        (
            efficiency / total,
            (sustainability / total).clamp(0.0, 1.0),
            impact / total,
        )
    } else {
        (0.0, 0.0, 0.0)
    };

    let objective = weights.satisfaction * satisfaction
        + weights.efficiency * efficiency
        + weights.sustainability * sustainability
        + weights.equity * equity;

    PlanScores {
        satisfaction,
        efficiency,
        sustainability,
        equity,
        objective,
        implementation_cost: cost,
        environmental_impact: impact,
    }
}

/// One minus the coefficient of variation; 1 for a single demand, 0 when
/// nothing was delivered to anyone
fn equity(ratios: &[f64]) -> f64 {
    match ratios.len() {
        0 | 1 => 1.0,
        n => {
            let mean = ratios.iter().sum::<f64>() / n as f64;
            if mean <= 0.0 {
                return 0.0;
            }
            let variance = ratios.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n as f64;
            (1.0 - variance.sqrt() / mean).clamp(0.0, 1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{DemandItem, Flow, SupplyItem};
    use worldgame_common::{Renewability, ResourceCategory, ResourceId, Urgency};

    fn problem() -> CategoryProblem {
        CategoryProblem {
            category: ResourceCategory::Energy,
            supplies: vec![SupplyItem {
                resource: ResourceId::new("coal"),
                ceiling: 100.0,
                environmental_impact: 0.5,
                renewability: Renewability::NonRenewable,
                sustainability_score: 1.0,
            }],
            demands: ["a", "b"]
                .iter()
                .zip([8u8, 2])
                .map(|(id, urgency)| DemandItem {
                    need: NeedId::new(*id),
                    urgency: Urgency::new(urgency),
                    requirement: 50.0,
                    vulnerability: 0.0,
                    weight: 1.0,
                    prior_satisfaction: 0.0,
                })
                .collect(),
            compatibility: vec![vec![0.8], vec![0.8]],
            cost: vec![vec![3.0], vec![3.0]],
        }
    }

    #[test]
    fn test_scores() {
        let p = problem();
        let s = CategorySolution {
            flows: vec![Flow {
                demand: 0,
                supply: 0,
                quantity: 50.0,
            }],
        };
        let scores = score_plan(&[(&p, &s)], &ObjectiveWeights::default());

        assert!((scores.satisfaction - 0.8).abs() < 1e-12);
        assert!((scores.efficiency - 0.2).abs() < 1e-12);
        assert!((scores.sustainability - 0.4).abs() < 1e-12);
        // ratios 1 and 0: mean 0.5, std 0.5
        assert!(scores.equity.abs() < 1e-12);
        assert!((scores.implementation_cost - 150.0).abs() < 1e-9);
        assert!((scores.environmental_impact - 0.5).abs() < 1e-12);
        let objective = 0.4 * 0.8 + 0.3 * 0.2 + 0.2 * 0.4;
        assert!((scores.objective - objective).abs() < 1e-12);
    }

    #[test]
    fn test_equity_edge_cases() {
        assert_eq!(equity(&[0.3]), 1.0);
        assert_eq!(equity(&[0.0, 0.0]), 0.0);
        assert_eq!(equity(&[0.5, 0.5, 0.5]), 1.0);
    }

    #[test]
    fn test_empty_plan_scores() {
        let scores = score_plan(&[], &ObjectiveWeights::default());
        assert_eq!(scores.satisfaction, 1.0);
        assert_eq!(scores.equity, 1.0);
        assert_eq!(scores.efficiency, 0.0);
    }
}

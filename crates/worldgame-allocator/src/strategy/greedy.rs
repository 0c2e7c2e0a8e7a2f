//! PriorityGreedy - urgent needs first, then pro-rata by compatibility
//!
//! ```text
//! priority = 0.5·urgency/10 + 0.3·weight_share + 0.2·vulnerability
//! ```
//!
//! Phase 1 serves demands at or above the urgent threshold in descending
//! priority (ties: higher urgency, then id) from their most compatible
//! resources. Phase 2 serves the unmet demands one urgency level at a time,
//! most urgent first; within a level each resource's remaining capacity is
//! water-filled pro-rata by compatibility.

use std::cmp::Reverse;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use worldgame_common::{AllocationError, StrategyKind, ALLOCATION_EPSILON};

use super::{spread_pro_rata, urgency_levels, AllocationStrategy};
use crate::problem::{CategoryProblem, CategorySolution, Flow};

/// Weights of the blended demand priority
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityWeights {
    pub urgency: f64,
    pub size: f64,
    pub vulnerability: f64,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            urgency: 0.5,
            size: 0.3,
            vulnerability: 0.2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PriorityGreedy {
    weights: PriorityWeights,
    urgent_threshold: u8,
}

impl PriorityGreedy {
    pub fn new(weights: PriorityWeights, urgent_threshold: u8) -> Self {
        Self {
            weights,
            urgent_threshold,
        }
    }

    pub fn priority(&self, problem: &CategoryProblem, demand: usize) -> f64 {
        let d = &problem.demands[demand];
        self.weights.urgency * d.urgency.fraction()
            + self.weights.size * problem.weight_share(demand)
            + self.weights.vulnerability * d.vulnerability
    }

    /// Urgent demands in service order
    fn urgent_order(&self, problem: &CategoryProblem) -> Vec<usize> {
        let mut urgent: Vec<usize> = (0..problem.demands.len())
            .filter(|&d| problem.demands[d].urgency.level() >= self.urgent_threshold)
            .collect();
        urgent.sort_by_key(|&d| {
            (
                Reverse(OrderedFloat(self.priority(problem, d))),
                Reverse(problem.demands[d].urgency),
                problem.demands[d].need.clone(),
            )
        });
        urgent
    }
}

impl Default for PriorityGreedy {
    fn default() -> Self {
        Self::new(PriorityWeights::default(), 7)
    }
}

impl AllocationStrategy for PriorityGreedy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PriorityGreedy
    }

    fn solve(&self, problem: &CategoryProblem) -> Result<CategorySolution, AllocationError> {
        let mut fill = Fill::new(problem);
        if problem.is_trivial() {
            return Ok(fill.finish());
        }

        // Phase 1
        for demand in self.urgent_order(problem) {
            let mut candidates: Vec<usize> = (0..problem.supplies.len()).collect();
            candidates.sort_by_key(|&s| {
                (
                    Reverse(OrderedFloat(problem.compatibility[demand][s])),
                    problem.supplies[s].resource.clone(),
                )
            });
            for supply in candidates {
                if fill.need[demand] <= ALLOCATION_EPSILON {
                    break;
                }
                let take = fill.need[demand].min(fill.capacity[supply]);
                fill.give(demand, supply, take);
            }
        }

        // Phase 2
        let waiting: Vec<usize> = (0..problem.demands.len())
            .filter(|&d| fill.need[d] > ALLOCATION_EPSILON)
            .collect();
        for (_, level) in urgency_levels(problem, waiting) {
            for supply in 0..problem.supplies.len() {
                if fill.capacity[supply] <= ALLOCATION_EPSILON {
                    continue;
                }
                let weights: Vec<f64> = level.iter().map(|&d| problem.compatibility[d][supply]).collect();
                let mut room: Vec<f64> = level.iter().map(|&d| fill.need[d]).collect();
                let placed = spread_pro_rata(fill.capacity[supply], &weights, &mut room);
                for (&demand, quantity) in level.iter().zip(placed) {
                    fill.give(demand, supply, quantity);
                }
            }
        }

        Ok(fill.finish())
    }
}

/// Running state of a greedy pass
struct Fill {
    capacity: Vec<f64>,
    need: Vec<f64>,
    amounts: Vec<Vec<f64>>,
}

impl Fill {
    fn new(problem: &CategoryProblem) -> Self {
        Self {
            capacity: problem.supplies.iter().map(|s| s.ceiling.max(0.0)).collect(),
            need: problem.demands.iter().map(|d| d.requirement.max(0.0)).collect(),
            amounts: vec![vec![0.0; problem.supplies.len()]; problem.demands.len()],
        }
    }

    fn give(&mut self, demand: usize, supply: usize, quantity: f64) -> f64 {
        if quantity <= 0.0 {
            return 0.0;
        }
        self.capacity[supply] = (self.capacity[supply] - quantity).max(0.0);
        self.need[demand] = (self.need[demand] - quantity).max(0.0);
        self.amounts[demand][supply] += quantity;
        quantity
    }

    fn finish(self) -> CategorySolution {
        let flows = self
            .amounts
            .into_iter()
            .enumerate()
            .flat_map(|(demand, row)| {
                row.into_iter()
                    .enumerate()
                    .filter(|(_, q)| *q > ALLOCATION_EPSILON)
                    .map(move |(supply, quantity)| Flow {
                        demand,
                        supply,
                        quantity,
                    })
            })
            .collect();
        CategorySolution { flows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{DemandItem, SupplyItem};
    use worldgame_common::{NeedId, Renewability, ResourceCategory, ResourceId, Urgency};

    fn supply(id: &str, ceiling: f64) -> SupplyItem {
        SupplyItem {
            resource: ResourceId::new(id),
            ceiling,
            environmental_impact: 0.0,
            renewability: Renewability::Renewable,
            sustainability_score: 1.0,
        }
    }

    fn demand(id: &str, urgency: u8, requirement: f64) -> DemandItem {
        DemandItem {
            need: NeedId::new(id),
            urgency: Urgency::new(urgency),
            requirement,
            vulnerability: 0.0,
            weight: 1.0,
            prior_satisfaction: 0.0,
        }
    }

    fn problem(supplies: Vec<SupplyItem>, demands: Vec<DemandItem>, compat: Vec<Vec<f64>>) -> CategoryProblem {
        let cost = compat.iter().map(|row| vec![1.0; row.len()]).collect();
        CategoryProblem {
            category: ResourceCategory::Water,
            supplies,
            demands,
            compatibility: compat,
            cost,
        }
    }

    #[test]
    fn test_urgent_need_served_first() {
        // 800 usable, A wants 600, B wants 500 and is more urgent
        let p = problem(
            vec![supply("water", 800.0)],
            vec![demand("a", 5, 600.0), demand("b", 9, 500.0)],
            vec![vec![1.0], vec![1.0]],
        );
        let solution = PriorityGreedy::default().solve(&p).unwrap();
        assert!((solution.received(1) - 500.0).abs() < 1e-9);
        assert!((solution.received(0) - 300.0).abs() < 1e-9);
        assert!(solution.supplied(0) <= 800.0 + 1e-9);
    }

    #[test]
    fn test_urgent_ties_break_on_urgency_then_id() {
        let p = problem(
            vec![supply("water", 100.0)],
            vec![demand("b", 8, 100.0), demand("a", 8, 100.0)],
            vec![vec![1.0], vec![1.0]],
        );
        let greedy = PriorityGreedy::default();
        assert_eq!(greedy.urgent_order(&p), vec![1, 0]);
        let solution = greedy.solve(&p).unwrap();
        assert!((solution.received(1) - 100.0).abs() < 1e-9);
        assert_eq!(solution.received(0), 0.0);
    }

    #[test]
    fn test_most_compatible_resource_used_first() {
        let p = problem(
            vec![supply("far", 100.0), supply("near", 100.0)],
            vec![demand("a", 9, 120.0)],
            vec![vec![0.4, 0.9]],
        );
        let solution = PriorityGreedy::default().solve(&p).unwrap();
        let from_near: f64 = solution.flows.iter().filter(|f| f.supply == 1).map(|f| f.quantity).sum();
        assert!((from_near - 100.0).abs() < 1e-9);
        assert!((solution.received(0) - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_pro_rata_with_redistribution() {
        // 90 units, compat 2:1, the favoured demand caps at 20 and the rest flows on
        let p = problem(
            vec![supply("water", 90.0)],
            vec![demand("a", 3, 20.0), demand("b", 3, 100.0)],
            vec![vec![0.8], vec![0.4]],
        );
        let solution = PriorityGreedy::default().solve(&p).unwrap();
        assert!((solution.received(0) - 20.0).abs() < 1e-9);
        assert!((solution.received(1) - 70.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_capacity() {
        let p = problem(
            vec![supply("water", 0.0)],
            vec![demand("a", 9, 10.0)],
            vec![vec![1.0]],
        );
        assert!(PriorityGreedy::default().solve(&p).unwrap().flows.is_empty());
    }

    #[test]
    fn test_higher_urgency_wins_below_threshold() {
        let p = problem(
            vec![supply("water", 800.0)],
            vec![demand("a", 3, 600.0), demand("b", 5, 500.0)],
            vec![vec![1.0], vec![1.0]],
        );
        let solution = PriorityGreedy::default().solve(&p).unwrap();
        assert!((solution.received(1) - 500.0).abs() < 1e-9);
        assert!((solution.received(0) - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_tied_demands_split_evenly() {
        let p = problem(
            vec![supply("water", 800.0)],
            vec![demand("a", 5, 600.0), demand("b", 5, 600.0)],
            vec![vec![1.0], vec![1.0]],
        );
        let solution = PriorityGreedy::default().solve(&p).unwrap();
        assert!((solution.received(0) - 400.0).abs() < 1e-9);
        assert!((solution.received(1) - 400.0).abs() < 1e-9);
    }
}

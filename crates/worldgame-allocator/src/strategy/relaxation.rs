//! Relaxation - continuous LP over one category
//!
//! ```text
//! maximize   Σ coef_ds · x_ds
//! coef_ds  = w_sat·compat_ds·urgency_d/10 + w_eff/(1 + cost_ds)
//!          + w_sust·sustainability_s + w_eq·(1 − prior_satisfaction_d)
//!
//! subject to Σ_d x_ds ≤ ceiling_s                      (every supply)
//!            Σ_s x_ds ≤ requirement_d                  (every demand)
//!            Σ_s x_ds ≥ min_coverage·requirement_d     (urgent demands)
//!            x_ds ≥ 0
//! ```
//!
//! The simplex lands on a vertex, which hands tied demands all-or-nothing
//! shares. Each supply's quantity going to one urgency level is therefore
//! re-spread over that level pro-rata by compatibility. Levels carrying a
//! coverage floor keep the vertex split.

use serde::{Deserialize, Serialize};
use tracing::debug;
use worldgame_common::{AllocationError, StrategyKind, ALLOCATION_EPSILON};

use super::simplex::{self, Constraint, LinearProgram, LpError, Relation};
use super::{spread_pro_rata, urgency_levels, AllocationStrategy};
use crate::problem::{CategoryProblem, CategorySolution, Flow};

/// Weights of the plan objective
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectiveWeights {
    pub satisfaction: f64,
    pub efficiency: f64,
    pub sustainability: f64,
    pub equity: f64,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self {
            satisfaction: 0.4,
            efficiency: 0.3,
            sustainability: 0.2,
            equity: 0.1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Relaxation {
    weights: ObjectiveWeights,
    urgent_threshold: u8,
    /// Coverage floor for urgent demands, as a share of requirement
    min_coverage: f64,
    max_iterations: usize,
}

impl Relaxation {
    pub fn new(weights: ObjectiveWeights, urgent_threshold: u8, min_coverage: f64, max_iterations: usize) -> Self {
        Self {
            weights,
            urgent_threshold,
            min_coverage,
            max_iterations,
        }
    }

    fn coefficient(&self, problem: &CategoryProblem, demand: usize, supply: usize) -> f64 {
        let d = &problem.demands[demand];
        let s = &problem.supplies[supply];
        self.weights.satisfaction * problem.compatibility[demand][supply] * d.urgency.fraction()
            + self.weights.efficiency / (1.0 + problem.cost[demand][supply])
            + self.weights.sustainability * s.sustainability_score
            + self.weights.equity * (1.0 - d.prior_satisfaction)
    }

    /// Variable `x_ds` lives at index `d·S + s`
    fn program(&self, problem: &CategoryProblem) -> LinearProgram {
        let demands = problem.demands.len();
        let supplies = problem.supplies.len();
        let vars = demands * supplies;

        let mut objective = vec![0.0; vars];
        for d in 0..demands {
            for s in 0..supplies {
                objective[d * supplies + s] = self.coefficient(problem, d, s);
            }
        }

        let mut constraints = Vec::with_capacity(supplies + 2 * demands);
        for (s, supply) in problem.supplies.iter().enumerate() {
            let mut row = vec![0.0; vars];
            for d in 0..demands {
                row[d * supplies + s] = 1.0;
            }
            constraints.push(Constraint::new(row, Relation::LessEq, supply.ceiling.max(0.0)));
        }
        for (d, demand) in problem.demands.iter().enumerate() {
            let mut row = vec![0.0; vars];
            row[d * supplies..(d + 1) * supplies].fill(1.0);
            let requirement = demand.requirement.max(0.0);

            if self.min_coverage > 0.0 && demand.urgency.level() >= self.urgent_threshold {
                constraints.push(Constraint::new(
                    row.clone(),
                    Relation::GreaterEq,
                    self.min_coverage.min(1.0) * requirement,
                ));
            }
            constraints.push(Constraint::new(row, Relation::LessEq, requirement));
        }

        LinearProgram {
            objective,
            constraints,
        }
    }

    /// Re-spread each supply's quantity within every urgency level
    fn even_out(&self, problem: &CategoryProblem, x: &mut [f64]) {
        let supplies = problem.supplies.len();
        let levels = urgency_levels(problem, 0..problem.demands.len());

        for s in 0..supplies {
            for (urgency, level) in &levels {
                if level.len() < 2 {
                    continue;
                }
                if self.min_coverage > 0.0 && urgency.level() >= self.urgent_threshold {
                    continue;
                }
                let total: f64 = level.iter().map(|&d| x[d * supplies + s]).sum();
                if total <= ALLOCATION_EPSILON {
                    continue;
                }

                let mut room: Vec<f64> = level
                    .iter()
                    .map(|&d| {
                        let elsewhere: f64 = (0..supplies)
                            .filter(|&o| o != s)
                            .map(|o| x[d * supplies + o])
                            .sum();
                        (problem.demands[d].requirement.max(0.0) - elsewhere).max(0.0)
                    })
                    .collect();
                let weights: Vec<f64> = level.iter().map(|&d| problem.compatibility[d][s]).collect();
                let mut placed = spread_pro_rata(total, &weights, &mut room);

                // zero-compatibility members take what the weighted fill left
                let leftover = total - placed.iter().sum::<f64>();
                if leftover > ALLOCATION_EPSILON {
                    let even = vec![1.0; level.len()];
                    for (p, extra) in placed.iter_mut().zip(spread_pro_rata(leftover, &even, &mut room)) {
                        *p += extra;
                    }
                }
                for (&d, quantity) in level.iter().zip(placed) {
                    x[d * supplies + s] = quantity;
                }
            }
        }
    }
}

impl Default for Relaxation {
    fn default() -> Self {
        Self::new(ObjectiveWeights::default(), 7, 0.0, 10_000)
    }
}

impl AllocationStrategy for Relaxation {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Relaxation
    }

    fn solve(&self, problem: &CategoryProblem) -> Result<CategorySolution, AllocationError> {
        if problem.is_trivial() {
            return Ok(CategorySolution::default());
        }

        let lp = self.program(problem);
        let solution = simplex::solve(&lp, self.max_iterations).map_err(|e| match e {
            LpError::Infeasible => AllocationError::InfeasibleAllocation(format!(
                "coverage floors exceed {} capacity",
                problem.category
            )),
            LpError::Unbounded => AllocationError::InfeasibleAllocation(format!(
                "unbounded {} relaxation",
                problem.category
            )),
            LpError::IterationLimit(iterations) => AllocationError::SolverFailure { iterations },
        })?;
        debug!(
            category = %problem.category,
            iterations = solution.iterations,
            objective = solution.objective,
            "Relaxation solved"
        );

        let mut x = solution.x;
        self.even_out(problem, &mut x);

        let supplies = problem.supplies.len();
        let flows = x
            .iter()
            .enumerate()
            .filter(|(_, q)| **q > ALLOCATION_EPSILON)
            .map(|(i, q)| Flow {
                demand: i / supplies,
                supply: i % supplies,
                quantity: *q,
            })
            .collect();
        Ok(CategorySolution { flows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{DemandItem, SupplyItem};
    use worldgame_common::{NeedId, Renewability, ResourceCategory, ResourceId, Urgency};

    fn problem(ceiling: f64, demands: &[(&str, u8, f64)]) -> CategoryProblem {
        CategoryProblem {
            category: ResourceCategory::Water,
            supplies: vec![SupplyItem {
                resource: ResourceId::new("water"),
                ceiling,
                environmental_impact: 0.0,
                renewability: Renewability::Renewable,
                sustainability_score: 1.0,
            }],
            demands: demands
                .iter()
                .map(|(id, urgency, requirement)| DemandItem {
                    need: NeedId::new(*id),
                    urgency: Urgency::new(*urgency),
                    requirement: *requirement,
                    vulnerability: 0.0,
                    weight: 1.0,
                    prior_satisfaction: 0.0,
                })
                .collect(),
            compatibility: vec![vec![1.0]; demands.len()],
            cost: vec![vec![1.0]; demands.len()],
        }
    }

    #[test]
    fn test_urgency_wins_scarce_capacity() {
        let p = problem(800.0, &[("a", 5, 600.0), ("b", 9, 500.0)]);
        let s = Relaxation::default().solve(&p).unwrap();
        assert!((s.received(1) - 500.0).abs() < 1e-6);
        assert!((s.received(0) - 300.0).abs() < 1e-6);
    }

    #[test]
    fn test_respects_ceiling_and_requirements() {
        let p = problem(50.0, &[("a", 5, 30.0), ("b", 5, 30.0)]);
        let s = Relaxation::default().solve(&p).unwrap();
        assert!(s.supplied(0) <= 50.0 + 1e-6);
        assert!(s.received(0) <= 30.0 + 1e-6);
        assert!(s.received(1) <= 30.0 + 1e-6);
        assert!((s.supplied(0) - 50.0).abs() < 1e-6);
    }

    #[test]
    fn test_infeasible_coverage_floor() {
        let strategy = Relaxation::new(ObjectiveWeights::default(), 7, 0.9, 1000);
        let p = problem(100.0, &[("a", 9, 100.0), ("b", 9, 100.0)]);
        assert!(matches!(
            strategy.solve(&p),
            Err(AllocationError::InfeasibleAllocation(_))
        ));
    }

    #[test]
    fn test_iteration_cap_reports_solver_failure() {
        let strategy = Relaxation::new(ObjectiveWeights::default(), 7, 0.0, 0);
        let p = problem(100.0, &[("a", 9, 10.0)]);
        assert!(matches!(
            strategy.solve(&p),
            Err(AllocationError::SolverFailure { iterations: 0 })
        ));
    }

    #[test]
    fn test_higher_urgency_wins_below_threshold() {
        let p = problem(800.0, &[("a", 3, 600.0), ("b", 5, 500.0)]);
        let s = Relaxation::default().solve(&p).unwrap();
        assert!((s.received(1) - 500.0).abs() < 1e-6);
        assert!((s.received(0) - 300.0).abs() < 1e-6);
    }

    #[test]
    fn test_tied_demands_split_evenly() {
        let p = problem(800.0, &[("a", 5, 600.0), ("b", 5, 600.0)]);
        let s = Relaxation::default().solve(&p).unwrap();
        assert!((s.received(0) - 400.0).abs() < 1e-6);
        assert!((s.received(1) - 400.0).abs() < 1e-6);
        assert!((s.supplied(0) - 800.0).abs() < 1e-6);
    }

    #[test]
    fn test_tied_demands_split_by_compatibility() {
        let mut p = problem(90.0, &[("a", 4, 20.0), ("b", 4, 100.0)]);
        p.compatibility = vec![vec![0.8], vec![0.4]];
        let s = Relaxation::default().solve(&p).unwrap();
        assert!((s.received(0) - 20.0).abs() < 1e-6);
        assert!((s.received(1) - 70.0).abs() < 1e-6);
    }
}

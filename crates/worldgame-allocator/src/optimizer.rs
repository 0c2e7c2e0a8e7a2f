//! AllocationOptimizer - one plan per pass
//!
//! A pass cuts the ledger into per-category problems under a read guard,
//! solves each category with the configured strategy (in parallel on the
//! blocking pool when enabled), recovers any strategy error by falling back to
//! PriorityGreedy, and merges the results in category order into one
//! [`AllocationPlan`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};
use worldgame_common::{AllocationPlan, PlanId, PlanKind, ResourceCategory, StrategyKind};
use worldgame_ledger::{Ledger, LedgerState};

use crate::compatibility::CompatibilityModel;
use crate::problem::{build_inputs, CategoryProblem, CategorySolution, CeilingMode, CeilingPolicy, PlanInputs};
use crate::scoring::score_plan;
use crate::strategy::{AllocationStrategy, PriorityGreedy, Relaxation};
use crate::OptimizerConfig;

/// Result of solving one category
#[derive(Debug, Clone)]
struct CategoryOutcome {
    category: ResourceCategory,
    solution: CategorySolution,
    fell_back: bool,
}

pub struct AllocationOptimizer {
    config: OptimizerConfig,
    model: CompatibilityModel,
    primary: Arc<dyn AllocationStrategy>,
    fallback: Arc<PriorityGreedy>,
    next_plan: AtomicU64,
}

impl AllocationOptimizer {
    pub fn new(config: OptimizerConfig, model: CompatibilityModel) -> Self {
        let fallback = Arc::new(PriorityGreedy::new(config.priority, config.urgent_threshold));
        let primary: Arc<dyn AllocationStrategy> = match config.strategy {
            StrategyKind::PriorityGreedy => fallback.clone(),
            StrategyKind::Relaxation => Arc::new(Relaxation::new(
                config.objective,
                config.urgent_threshold,
                config.min_coverage,
                config.max_iterations,
            )),
        };
        Self {
            config,
            model,
            primary,
            fallback,
            next_plan: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn model(&self) -> &CompatibilityModel {
        &self.model
    }

    /// Ceiling policy for a plan kind
    pub fn policy(&self, kind: &PlanKind) -> CeilingPolicy {
        let mode = match kind {
            PlanKind::Routine => CeilingMode::Routine {
                emergency_reserve_fraction: self.config.emergency_reserve_fraction,
            },
            PlanKind::CrisisResponse(_) => CeilingMode::Crisis,
        };
        CeilingPolicy {
            mode,
            critical_correction: self.config.critical_correction,
        }
    }

    pub fn inputs(&self, state: &LedgerState, kind: &PlanKind) -> PlanInputs {
        build_inputs(state, kind, self.policy(kind), &self.model)
    }

    /// Plan synchronously against a ledger view, one category after another
    pub fn plan(&self, state: &LedgerState, kind: PlanKind) -> AllocationPlan {
        let inputs = self.inputs(state, &kind);
        let outcomes = inputs
            .problems
            .iter()
            .map(|problem| solve_category(self.primary.as_ref(), &self.fallback, problem))
            .collect();
        self.assemble(inputs, outcomes)
    }

    /// Plan against the live ledger, solving categories in parallel when
    /// configured
    #[instrument(skip(self, ledger))]
    pub async fn optimize(&self, ledger: &Ledger, kind: PlanKind) -> AllocationPlan {
        let inputs = ledger.read(|state| self.inputs(state, &kind));
        if !self.config.parallel || inputs.problems.len() < 2 {
            let outcomes = inputs
                .problems
                .iter()
                .map(|problem| solve_category(self.primary.as_ref(), &self.fallback, problem))
                .collect();
            return self.assemble(inputs, outcomes);
        }

        let mut tasks = JoinSet::new();
        for (index, problem) in inputs.problems.iter().cloned().enumerate() {
            let primary = self.primary.clone();
            let fallback = self.fallback.clone();
            tasks.spawn_blocking(move || (index, solve_category(primary.as_ref(), &fallback, &problem)));
        }

        let mut solved: BTreeMap<usize, CategoryOutcome> = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => {
                    solved.insert(index, outcome);
                }
                Err(e) => warn!(error = %e, "Category solver task failed"),
            }
        }

        // A lost task is re-solved here with the fallback strategy
        let outcomes = inputs
            .problems
            .iter()
            .enumerate()
            .map(|(index, problem)| {
                solved.remove(&index).unwrap_or_else(|| CategoryOutcome {
                    category: problem.category,
                    solution: self.fallback.solve(problem).unwrap_or_default(),
                    fell_back: true,
                })
            })
            .collect();
        self.assemble(inputs, outcomes)
    }

    fn assemble(&self, inputs: PlanInputs, outcomes: Vec<CategoryOutcome>) -> AllocationPlan {
        let id = PlanId(self.next_plan.fetch_add(1, Ordering::SeqCst));
        let fell_back = outcomes.iter().any(|o| o.fell_back);
        let strategy = if fell_back {
            StrategyKind::PriorityGreedy
        } else {
            self.primary.kind()
        };

        let mut plan = AllocationPlan::empty(id, inputs.kind.clone(), strategy, inputs.day);
        plan.covered_needs = inputs.covered.clone();

        for (problem, outcome) in inputs.problems.iter().zip(&outcomes) {
            debug_assert_eq!(problem.category, outcome.category);
            for flow in &outcome.solution.flows {
                plan.add(
                    problem.demands[flow.demand].need.clone(),
                    problem.supplies[flow.supply].resource.clone(),
                    flow.quantity,
                );
            }
        }

        let solved: Vec<(&CategoryProblem, &CategorySolution)> = inputs
            .problems
            .iter()
            .zip(outcomes.iter().map(|o| &o.solution))
            .collect();
        plan.scores = score_plan(&solved, &self.config.objective);
        plan.fallback = fell_back;
        plan.confidence = if fell_back {
            self.config.fallback_confidence.min(0.4)
        } else {
            match strategy {
                StrategyKind::Relaxation => self.config.relaxation_confidence,
                StrategyKind::PriorityGreedy => self.config.greedy_confidence,
            }
        };

        info!(
            plan = %plan.id,
            strategy = %plan.strategy,
            needs = plan.covered_needs.len(),
            total = plan.total(),
            objective = plan.scores.objective,
            confidence = plan.confidence,
            fallback = plan.fallback,
            "Built allocation plan"
        );
        plan
    }
}

/// Solve with the primary strategy, falling back to greedy on error
fn solve_category(
    primary: &dyn AllocationStrategy,
    fallback: &PriorityGreedy,
    problem: &CategoryProblem,
) -> CategoryOutcome {
    match primary.solve(problem) {
        Ok(solution) => CategoryOutcome {
            category: problem.category,
            solution,
            fell_back: false,
        },
        Err(e) => {
            warn!(
                category = %problem.category,
                strategy = %primary.kind(),
                error = %e,
                "Strategy failed, falling back to priority greedy"
            );
            let solution = fallback.solve(problem).unwrap_or_else(|e| {
                debug!(category = %problem.category, error = %e, "Fallback produced no allocation");
                CategorySolution::default()
            });
            CategoryOutcome {
                category: problem.category,
                solution,
                fell_back: true,
            }
        }
    }
}

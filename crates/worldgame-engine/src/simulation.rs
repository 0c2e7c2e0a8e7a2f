//! Simulation - the daily tick driver

use std::collections::BTreeSet;
use std::sync::Arc;

use prometheus::Registry;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use worldgame_allocator::{AllocationOptimizer, CompatibilityModel};
use worldgame_common::rng::{derive_seed, resolve_seed};
use worldgame_common::{
    AllocationPlan, ChallengeId, ChallengeState, CommunityId, CrisisError, Day, Decision, DecisionScope,
    ImplementationStatus, NeedStatus, PlanId, PlanKind, ProposalId, ProposedAction, RegionId,
    Result, WorldGameError,
};
use worldgame_crisis::{ChallengeSchedule, CrisisCoordinator};
use worldgame_governance::GovernanceLedger;
use worldgame_ledger::{HistoryEvent, Ledger};

use crate::config::WorldGameConfig;
use crate::scenario::Scenario;
use crate::telemetry::EngineMetrics;
use crate::voting::{SeededVoting, VotingBehavior};

const VOTING_STREAM: u64 = 0xB411;

/// What happened on one simulated day
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DayReport {
    pub day: Day,
    pub detected: Vec<ChallengeId>,
    pub drafted: Vec<ChallengeId>,
    /// Routine plan built today, if any
    pub routine_plan: Option<PlanId>,
    /// Whether the routine plan bypassed governance
    pub committed_directly: bool,
    pub proposals: Vec<ProposalId>,
    pub decisions: Vec<Decision>,
    pub resolved: Vec<(ChallengeId, ChallengeState)>,
    pub retired: usize,
}

/// End-of-run totals
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub seed: u64,
    pub days: Day,
    pub plans_committed: usize,
    pub proposals: usize,
    pub approved: usize,
    pub rejected: usize,
    pub challenges_detected: usize,
    pub resolved_success: usize,
    pub resolved_failure: usize,
    pub expired: usize,
    pub active_needs: usize,
    pub satisfied_needs: usize,
    pub failed_needs: usize,
    /// Mean satisfaction over every need ever registered
    pub mean_satisfaction: f64,
    pub history_entries: usize,
}

pub struct Simulation {
    config: WorldGameConfig,
    seed: u64,
    day: Day,
    ledger: Arc<Ledger>,
    optimizer: AllocationOptimizer,
    governance: GovernanceLedger,
    crisis: CrisisCoordinator,
    schedule: ChallengeSchedule,
    voting: Box<dyn VotingBehavior>,
    metrics: EngineMetrics,
    registry: Registry,
    /// Routine proposal still being voted on
    routine_vote: Option<ProposalId>,
}

impl Simulation {
    /// Build a run from configuration and scenario records
    pub fn new(config: WorldGameConfig, scenario: Scenario) -> Result<Self> {
        let seed = resolve_seed(config.simulation.seed);

        let ledger = Arc::new(Ledger::new(config.ledger.clone()));
        scenario.load_into(&ledger)?;

        let schedule = match scenario.schedule {
            Some(schedule) => schedule,
            None => {
                let regions: Vec<RegionId> = ledger.read(|s| s.registry.regions().cloned().collect());
                ChallengeSchedule::generate(seed, config.simulation.days, &regions, &config.crisis.schedule)
            }
        };

        let metrics = EngineMetrics::new().map_err(telemetry_error)?;
        let registry = Registry::new();
        metrics.register(&registry).map_err(telemetry_error)?;

        info!(
            seed,
            days = config.simulation.days,
            challenges = schedule.len(),
            strategy = %config.optimizer.strategy,
            "Simulation ready"
        );
        Ok(Self {
            optimizer: AllocationOptimizer::new(
                config.optimizer.clone(),
                CompatibilityModel::new(config.compatibility.clone()),
            ),
            governance: GovernanceLedger::new(config.governance.clone(), ledger.clone()),
            crisis: CrisisCoordinator::new(config.crisis.clone(), ledger.clone()),
            voting: Box::new(SeededVoting::new(derive_seed(seed, VOTING_STREAM))),
            config,
            seed,
            day: 0,
            ledger,
            schedule,
            metrics,
            registry,
            routine_vote: None,
        })
    }

    /// Replace the simulated electorate
    pub fn with_voting(mut self, voting: Box<dyn VotingBehavior>) -> Self {
        self.voting = voting;
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn day(&self) -> Day {
        self.day
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn optimizer(&self) -> &AllocationOptimizer {
        &self.optimizer
    }

    pub fn governance(&self) -> &GovernanceLedger {
        &self.governance
    }

    pub fn crisis(&self) -> &CrisisCoordinator {
        &self.crisis
    }

    pub fn schedule(&self) -> &ChallengeSchedule {
        &self.schedule
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Simulate every configured day
    pub async fn run(&mut self) -> Result<RunSummary> {
        while self.day < self.config.simulation.days {
            self.step().await?;
        }
        let summary = self.summary();
        info!(
            days = summary.days,
            plans = summary.plans_committed,
            approved = summary.approved,
            rejected = summary.rejected,
            success = summary.resolved_success,
            failure = summary.resolved_failure,
            expired = summary.expired,
            mean_satisfaction = summary.mean_satisfaction,
            "Simulation finished"
        );
        Ok(summary)
    }

    /// Advance one day
    #[instrument(skip(self), fields(day = self.day + 1))]
    pub async fn step(&mut self) -> Result<DayReport> {
        let day = self.day + 1;
        self.governance.advance_to(day);
        let mut report = DayReport {
            day,
            ..DayReport::default()
        };

        let due: Vec<_> = self.schedule.due_on(day).cloned().collect();
        for entry in due {
            match self.crisis.detect(entry.spec) {
                Ok(id) => {
                    self.metrics.challenges_detected.inc();
                    report.detected.push(id);
                }
                Err(e) => warn!(day, error = %e, "Scheduled challenge rejected"),
            }
        }

        for id in self.crisis.in_state(ChallengeState::Detected) {
            self.crisis.draft_response(&id, &self.optimizer).await?;
            let proposal = self.crisis.open_vote(&id, &self.governance)?;
            self.metrics.proposals_created.inc();
            self.cast_ballots(proposal)?;
            report.drafted.push(id);
            report.proposals.push(proposal);
        }

        if self.routine_vote.is_none() {
            self.plan_routine(&mut report).await?;
        }

        for decision in self.governance.finalize_due() {
            self.settle(&decision, &mut report)?;
            report.decisions.push(decision);
        }

        for resolution in self.crisis.tick() {
            self.metrics.observe_resolution(resolution.outcome);
            report.resolved.push((resolution.challenge, resolution.outcome));
        }
        report.retired = self.ledger.retire_needs(day).len();
        self.ledger.apply_daily_regeneration();
        self.ledger.read(|s| self.metrics.observe_ledger(s));

        self.day = day;
        debug!(
            day,
            detected = report.detected.len(),
            decisions = report.decisions.len(),
            retired = report.retired,
            "Day complete"
        );
        Ok(report)
    }

    /// Plan routine needs; commit directly unless the plan is contested
    async fn plan_routine(&mut self, report: &mut DayReport) -> Result<()> {
        let plan = self.optimizer.optimize(&self.ledger, PlanKind::Routine).await;
        if plan.covered_needs.is_empty() {
            return Ok(());
        }
        report.routine_plan = Some(plan.id);

        let (regions, proposer) = self.ledger.read(|s| {
            let needs: Vec<_> = plan
                .covered_needs
                .iter()
                .filter_map(|id| s.registry.need(id).ok())
                .collect();
            let regions: BTreeSet<RegionId> = needs.iter().filter_map(|n| n.region.clone()).collect();
            let proposer: Option<CommunityId> = needs
                .iter()
                .filter_map(|n| n.community.clone())
                .next()
                .or_else(|| s.registry.communities().map(|c| c.id.clone()).next());
            (regions, proposer)
        });

        let contested =
            regions.len() > 1 || plan.confidence < self.config.simulation.governance_confidence;
        match proposer {
            Some(proposer) if contested => {
                let scope = scope_for(regions.len());
                let id = self.governance.create_proposal(
                    format!("Routine allocation {}", plan.id),
                    scope,
                    vec![ProposedAction::ResourceAllocation(plan)],
                    &proposer,
                    false,
                )?;
                self.metrics.proposals_created.inc();
                self.cast_ballots(id)?;
                self.routine_vote = Some(id);
                report.proposals.push(id);
            }
            _ => {
                let commit = self.ledger.commit_allocation(&plan)?;
                self.metrics.observe_commit(&plan, commit.adjustments.len());
                report.committed_directly = true;
            }
        }
        Ok(())
    }

    /// Apply the consequences of a finalized proposal
    fn settle(&mut self, decision: &Decision, report: &mut DayReport) -> Result<()> {
        self.metrics.observe_decision(decision);
        let proposal = self.governance.proposal(decision.proposal)?;

        if decision.implementation == ImplementationStatus::Committed {
            for action in &proposal.actions {
                self.metrics.observe_commit(action.plan(), 0);
            }
        }
        if self.routine_vote == Some(decision.proposal) {
            self.routine_vote = None;
        }

        for action in &proposal.actions {
            let Some(challenge) = action.challenge() else {
                continue;
            };
            match self.crisis.evaluate(challenge, decision) {
                Ok(outcome) if outcome.is_terminal() => {
                    self.metrics.observe_resolution(outcome);
                    report.resolved.push((challenge.clone(), outcome));
                }
                Ok(_) => {}
                // Expired while the vote was open
                Err(CrisisError::InvalidTransition { state, .. }) => {
                    debug!(challenge = %challenge, ?state, "Decision arrived after challenge closed");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn cast_ballots(&mut self, id: ProposalId) -> Result<()> {
        let proposal = self.governance.proposal(id)?;
        let electorate = self.ledger.read(|s| {
            proposal
                .eligible_voters
                .iter()
                .filter_map(|c| s.registry.community(c).ok().cloned())
                .collect::<Vec<_>>()
        });
        for community in &electorate {
            if let Some(choice) = self.voting.ballot(community, &proposal) {
                self.governance.cast_vote(id, &community.id, choice)?;
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> RunSummary {
        let governance = self.governance.metrics();
        let challenges = self.crisis.challenges();
        let count = |state: ChallengeState| challenges.iter().filter(|c| c.state == state).count();

        let (active, satisfied, failed, mean_satisfaction) = self.ledger.read(|s| {
            let needs: Vec<_> = s.registry.needs().collect();
            let with = |status: NeedStatus| needs.iter().filter(|n| n.status == status).count();
            let mean = if needs.is_empty() {
                0.0
            } else {
                needs.iter().map(|n| n.satisfaction).sum::<f64>() / needs.len() as f64
            };
            (
                with(NeedStatus::Active),
                with(NeedStatus::Satisfied),
                with(NeedStatus::Failed),
                mean,
            )
        });

        let history = self.ledger.history();
        RunSummary {
            seed: self.seed,
            days: self.day,
            plans_committed: history
                .filter(|e| matches!(e, HistoryEvent::PlanCommitted { .. }))
                .len(),
            proposals: governance.proposals,
            approved: governance.approved,
            rejected: governance.decided - governance.approved,
            challenges_detected: challenges.len(),
            resolved_success: count(ChallengeState::ResolvedSuccess),
            resolved_failure: count(ChallengeState::ResolvedFailure),
            expired: count(ChallengeState::Expired),
            active_needs: active,
            satisfied_needs: satisfied,
            failed_needs: failed,
            mean_satisfaction,
            history_entries: history.len(),
        }
    }

    /// Plans awaiting a vote
    pub fn pending_plans(&self) -> Vec<AllocationPlan> {
        self.routine_vote
            .and_then(|id| self.governance.proposal(id).ok())
            .map(|p| p.actions.iter().map(|a| a.plan().clone()).collect())
            .unwrap_or_default()
    }
}

/// Single-region routine plans stay bioregional
fn scope_for(regions: usize) -> DecisionScope {
    DecisionScope::for_region_count(regions)
}

fn telemetry_error(err: prometheus::Error) -> WorldGameError {
    WorldGameError::Telemetry(err.to_string())
}

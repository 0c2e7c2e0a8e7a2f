//! GovernanceLedger - proposals, ballots and decisions
//!
//! Ballots land concurrently in a [`DashMap`] keyed by proposal. Finalizing
//! holds the proposal's shard lock from tally to stored decision, so racing
//! finalize calls serialize and every caller sees the same decision.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use worldgame_common::{
    CommunityId, Day, Decision, DecisionScope, GovernanceError, ImplementationStatus,
    InvalidVoteReason, Proposal, ProposalId, ProposalStatus, ProposedAction, VoteChoice, VoteTally,
};
use worldgame_ledger::{HistoryEvent, Ledger};

use crate::electorate::eligible_voters;
use crate::tally::{decide, vote_weight};
use crate::GovernanceConfig;

#[derive(Debug, Clone)]
struct ProposalEntry {
    proposal: Proposal,
    decision: Option<Decision>,
}

/// Aggregate voting statistics
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GovernanceMetrics {
    pub proposals: usize,
    pub open: usize,
    pub decided: usize,
    pub approved: usize,
    /// Approved over decided
    pub approval_rate: f64,
    /// Mean participation rate over decided proposals
    pub mean_participation: f64,
}

pub struct GovernanceLedger {
    config: GovernanceConfig,
    ledger: Arc<Ledger>,
    proposals: DashMap<ProposalId, ProposalEntry>,
    next_id: AtomicU64,
}

impl GovernanceLedger {
    pub fn new(config: GovernanceConfig, ledger: Arc<Ledger>) -> Self {
        Self {
            config,
            ledger,
            proposals: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Open a proposal; the electorate is fixed at creation
    #[instrument(skip(self, title, actions, proposer), fields(proposer = %proposer))]
    pub fn create_proposal(
        &self,
        title: impl Into<String>,
        scope: DecisionScope,
        actions: Vec<ProposedAction>,
        proposer: &CommunityId,
        expedited: bool,
    ) -> Result<ProposalId, GovernanceError> {
        let (eligible, day) = self.ledger.read(|state| {
            eligible_voters(state, scope, proposer, &self.config).map(|voters| (voters, state.day))
        })?;

        let window = if expedited {
            self.config.crisis_voting_days
        } else {
            self.config.voting_days
        };
        let id = ProposalId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let proposal = Proposal {
            id,
            title: title.into(),
            scope,
            actions,
            proposer: proposer.clone(),
            created_on: day,
            deadline: day.saturating_add(window),
            expedited,
            eligible_voters: eligible,
            ballots: BTreeMap::new(),
            status: ProposalStatus::Open,
        };

        info!(
            proposal = %id,
            scope = %scope,
            eligible = proposal.eligible_voters.len(),
            deadline = proposal.deadline,
            expedited,
            "Created proposal"
        );
        self.ledger.history().record(
            day,
            HistoryEvent::ProposalCreated {
                proposal: id,
                title: proposal.title.clone(),
                eligible_voters: proposal.eligible_voters.len(),
                deadline: proposal.deadline,
            },
        );
        self.proposals.insert(
            id,
            ProposalEntry {
                proposal,
                decision: None,
            },
        );
        Ok(id)
    }

    /// Record a ballot; a repeat ballot replaces the earlier one
    pub fn cast_vote(
        &self,
        id: ProposalId,
        voter: &CommunityId,
        choice: VoteChoice,
    ) -> Result<(), GovernanceError> {
        let day = self.ledger.day();
        let mut entry = self
            .proposals
            .get_mut(&id)
            .ok_or(GovernanceError::UnknownProposal(id))?;
        let proposal = &mut entry.proposal;

        let invalid = |reason| GovernanceError::InvalidVote {
            proposal: id,
            voter: voter.clone(),
            reason,
        };
        if !proposal.is_open() {
            return Err(invalid(InvalidVoteReason::AlreadyFinalized));
        }
        if day > proposal.deadline {
            return Err(invalid(InvalidVoteReason::DeadlinePassed {
                deadline: proposal.deadline,
                day,
            }));
        }
        if !proposal.is_eligible(voter) {
            return Err(invalid(InvalidVoteReason::Ineligible));
        }

        if let Some(previous) = proposal.ballots.insert(voter.clone(), choice) {
            debug!(proposal = %id, voter = %voter, ?previous, ?choice, "Replaced ballot");
        }
        Ok(())
    }

    /// Tally, decide and implement a proposal
    ///
    /// Only the first call decides; later calls return the stored decision.
    #[instrument(skip(self))]
    pub fn finalize(&self, id: ProposalId) -> Result<Decision, GovernanceError> {
        let mut entry = self
            .proposals
            .get_mut(&id)
            .ok_or(GovernanceError::UnknownProposal(id))?;
        if let Some(decision) = &entry.decision {
            return Ok(decision.clone());
        }

        let (tally, day) = self.ledger.read(|state| -> Result<_, GovernanceError> {
            let mut tally = VoteTally::default();
            for (voter, choice) in &entry.proposal.ballots {
                let community = state.registry.community(voter)?;
                tally.record(*choice, vote_weight(community, &self.config.vote_weights));
            }
            Ok((tally, state.day))
        })?;

        let proposal = &entry.proposal;
        let threshold = self.config.thresholds.for_scope(proposal.scope);
        let outcome = decide(&tally, threshold);

        let implementation = if outcome.is_approved() {
            self.implement(proposal)
        } else {
            ImplementationStatus::Discarded
        };

        let decision = Decision {
            proposal: id,
            scope: proposal.scope,
            tally,
            for_fraction: tally.for_fraction(),
            threshold,
            outcome,
            implementation,
            participation_rate: proposal.participation_rate(),
            decided_on: day,
        };

        info!(
            proposal = %id,
            outcome = ?decision.outcome,
            for_fraction = decision.for_fraction,
            threshold,
            ballots = tally.ballots(),
            implementation = ?implementation,
            "Finalized proposal"
        );
        self.ledger
            .history()
            .record(day, HistoryEvent::DecisionRecorded(decision.clone()));

        entry.proposal.status = ProposalStatus::Finalized;
        entry.decision = Some(decision.clone());
        Ok(decision)
    }

    /// Commit every plan the proposal carries, or none of them
    fn implement(&self, proposal: &Proposal) -> ImplementationStatus {
        for action in &proposal.actions {
            let plan = action.plan();
            if let Err(e) = self.ledger.validate_plan(plan) {
                warn!(proposal = %proposal.id, plan = %plan.id, error = %e, "Approved plan cannot be committed");
                return ImplementationStatus::Failed;
            }
        }
        for action in &proposal.actions {
            let plan = action.plan();
            if let Err(e) = self.ledger.commit_allocation(plan) {
                warn!(proposal = %proposal.id, plan = %plan.id, error = %e, "Approved plan failed to commit");
                return ImplementationStatus::Failed;
            }
        }
        ImplementationStatus::Committed
    }

    /// Move the shared clock forward and report proposals now past deadline
    pub fn advance_to(&self, day: Day) -> Vec<ProposalId> {
        if day > self.ledger.day() {
            self.ledger.set_day(day);
        }
        self.due_proposals()
    }

    /// Open proposals whose voting window has closed, in id order
    pub fn due_proposals(&self) -> Vec<ProposalId> {
        let day = self.ledger.day();
        let mut due: Vec<ProposalId> = self
            .proposals
            .iter()
            .filter(|e| e.proposal.is_open() && e.proposal.deadline < day)
            .map(|e| e.proposal.id)
            .collect();
        due.sort();
        due
    }

    /// Finalize every due proposal
    pub fn finalize_due(&self) -> Vec<Decision> {
        self.due_proposals()
            .into_iter()
            .filter_map(|id| match self.finalize(id) {
                Ok(decision) => Some(decision),
                Err(e) => {
                    warn!(proposal = %id, error = %e, "Failed to finalize proposal");
                    None
                }
            })
            .collect()
    }

    pub fn proposal(&self, id: ProposalId) -> Result<Proposal, GovernanceError> {
        self.proposals
            .get(&id)
            .map(|e| e.proposal.clone())
            .ok_or(GovernanceError::UnknownProposal(id))
    }

    pub fn decision(&self, id: ProposalId) -> Option<Decision> {
        self.proposals.get(&id).and_then(|e| e.decision.clone())
    }

    /// Decisions in proposal order
    pub fn decisions(&self) -> Vec<Decision> {
        let mut decisions: Vec<Decision> = self
            .proposals
            .iter()
            .filter_map(|e| e.decision.clone())
            .collect();
        decisions.sort_by_key(|d| d.proposal);
        decisions
    }

    pub fn metrics(&self) -> GovernanceMetrics {
        let decisions = self.decisions();
        let proposals = self.proposals.len();
        let decided = decisions.len();
        let approved = decisions.iter().filter(|d| d.is_approved()).count();
        let (approval_rate, mean_participation) = if decided == 0 {
            (0.0, 0.0)
        } else {
            (
                approved as f64 / decided as f64,
                decisions.iter().map(|d| d.participation_rate).sum::<f64>() / decided as f64,
            )
        };
        GovernanceMetrics {
            proposals,
            open: proposals - decided,
            decided,
            approved,
            approval_rate,
            mean_participation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use worldgame_common::{
        AllocationPlan, Community, DecisionOutcome, Need, PlanId, PlanKind, RejectionReason,
        Resource, ResourceCategory, ResourceId, StrategyKind, Urgency,
    };
    use worldgame_ledger::LedgerConfig;

    /// `n` identical communities in one region, every ballot weighted equally
    fn ledger_with(n: usize) -> Arc<Ledger> {
        let ledger = Ledger::new(LedgerConfig::default());
        for i in 0..n {
            ledger
                .register_community(Community::new(format!("c{:03}", i), "r", 500).with_governance(0.5, 0.5))
                .unwrap();
        }
        ledger
            .register_resource(Resource::new("water", ResourceCategory::Water, 1000.0))
            .unwrap();
        ledger
            .register_need(
                Need::new("n1", Urgency::new(6))
                    .with_requirement(ResourceCategory::Water, 300.0)
                    .with_community("c000".into(), "r".into()),
            )
            .unwrap();
        Arc::new(ledger)
    }

    fn plan() -> AllocationPlan {
        let mut plan = AllocationPlan::empty(PlanId(1), PlanKind::Routine, StrategyKind::Relaxation, 0);
        plan.covered_needs.insert("n1".into());
        plan.add("n1".into(), "water".into(), 250.0);
        plan
    }

    fn voter(i: usize) -> CommunityId {
        CommunityId::new(format!("c{:03}", i))
    }

    #[test]
    fn test_planetary_approval_commits_plan() {
        let ledger = ledger_with(100);
        let governance = GovernanceLedger::new(GovernanceConfig::default(), ledger.clone());
        let id = governance
            .create_proposal(
                "water share",
                DecisionScope::Planetary,
                vec![ProposedAction::ResourceAllocation(plan())],
                &voter(0),
                false,
            )
            .unwrap();

        for i in 0..100 {
            let choice = if i < 80 { VoteChoice::For } else { VoteChoice::Against };
            governance.cast_vote(id, &voter(i), choice).unwrap();
        }
        let decision = governance.finalize(id).unwrap();

        assert!((decision.for_fraction - 0.8).abs() < 1e-9);
        assert_eq!(decision.outcome, DecisionOutcome::Approved);
        assert_eq!(decision.implementation, ImplementationStatus::Committed);
        assert_eq!(decision.participation_rate, 1.0);
        let water = ledger.resource(&ResourceId::new("water")).unwrap();
        assert!((water.allocated_total() - 250.0).abs() < 1e-9);
    }

    #[test]
    fn test_failing_action_commits_nothing() {
        let ledger = ledger_with(10);
        let governance = GovernanceLedger::new(GovernanceConfig::default(), ledger.clone());
        let mut broken = AllocationPlan::empty(PlanId(2), PlanKind::Routine, StrategyKind::Relaxation, 0);
        broken.covered_needs.insert("ghost".into());
        broken.add("ghost".into(), "water".into(), 100.0);
        let id = governance
            .create_proposal(
                "two shares",
                DecisionScope::Bioregional,
                vec![
                    ProposedAction::ResourceAllocation(plan()),
                    ProposedAction::ResourceAllocation(broken),
                ],
                &voter(0),
                false,
            )
            .unwrap();
        for i in 0..10 {
            governance.cast_vote(id, &voter(i), VoteChoice::For).unwrap();
        }
        let decision = governance.finalize(id).unwrap();

        assert!(decision.is_approved());
        assert_eq!(decision.implementation, ImplementationStatus::Failed);
        // the valid first plan was not written either
        let water = ledger.resource(&ResourceId::new("water")).unwrap();
        assert_eq!(water.allocated_total(), 0.0);
        assert_eq!(ledger.need(&"n1".into()).unwrap().satisfaction, 0.0);
    }

    #[test]
    fn test_rejection_discards_plan() {
        let ledger = ledger_with(10);
        let governance = GovernanceLedger::new(GovernanceConfig::default(), ledger.clone());
        let id = governance
            .create_proposal(
                "water share",
                DecisionScope::Bioregional,
                vec![ProposedAction::ResourceAllocation(plan())],
                &voter(0),
                false,
            )
            .unwrap();
        for i in 0..10 {
            let choice = match i {
                0..=3 => VoteChoice::For,
                4..=6 => VoteChoice::Against,
                _ => VoteChoice::Abstain,
            };
            governance.cast_vote(id, &voter(i), choice).unwrap();
        }

        let decision = governance.finalize(id).unwrap();
        assert_eq!(
            decision.outcome,
            DecisionOutcome::Rejected(RejectionReason::ThresholdNotMet)
        );
        assert_eq!(decision.implementation, ImplementationStatus::Discarded);
        assert_eq!(ledger.resource(&ResourceId::new("water")).unwrap().allocated_total(), 0.0);
    }

    #[test]
    fn test_invalid_votes() {
        let ledger = ledger_with(3);
        ledger
            .register_community(Community::new("outsider", "elsewhere", 100))
            .unwrap();
        let governance = GovernanceLedger::new(GovernanceConfig::default(), ledger.clone());
        let id = governance
            .create_proposal("t", DecisionScope::Bioregional, vec![], &voter(0), true)
            .unwrap();
        assert_eq!(governance.proposal(id).unwrap().deadline, 2);

        let err = governance
            .cast_vote(id, &CommunityId::new("outsider"), VoteChoice::For)
            .unwrap_err();
        assert!(matches!(
            err,
            GovernanceError::InvalidVote {
                reason: InvalidVoteReason::Ineligible,
                ..
            }
        ));

        governance.advance_to(3);
        let err = governance.cast_vote(id, &voter(1), VoteChoice::For).unwrap_err();
        assert!(matches!(
            err,
            GovernanceError::InvalidVote {
                reason: InvalidVoteReason::DeadlinePassed { deadline: 2, day: 3 },
                ..
            }
        ));

        let err = governance
            .cast_vote(ProposalId(99), &voter(1), VoteChoice::For)
            .unwrap_err();
        assert_eq!(err, GovernanceError::UnknownProposal(ProposalId(99)));
    }

    #[test]
    fn test_revote_replaces_ballot() {
        let ledger = ledger_with(1);
        let governance = GovernanceLedger::new(GovernanceConfig::default(), ledger);
        let id = governance
            .create_proposal("t", DecisionScope::Local, vec![], &voter(0), false)
            .unwrap();
        governance.cast_vote(id, &voter(0), VoteChoice::Against).unwrap();
        governance.cast_vote(id, &voter(0), VoteChoice::For).unwrap();

        let decision = governance.finalize(id).unwrap();
        assert_eq!(decision.tally.ballots(), 1);
        assert!(decision.is_approved());
    }

    #[test]
    fn test_finalize_is_idempotent_across_threads() {
        let ledger = ledger_with(5);
        let governance = Arc::new(GovernanceLedger::new(GovernanceConfig::default(), ledger.clone()));
        let id = governance
            .create_proposal(
                "t",
                DecisionScope::Bioregional,
                vec![ProposedAction::ResourceAllocation(plan())],
                &voter(0),
                false,
            )
            .unwrap();
        for i in 0..5 {
            governance.cast_vote(id, &voter(i), VoteChoice::For).unwrap();
        }

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let governance = governance.clone();
                thread::spawn(move || governance.finalize(id).unwrap())
            })
            .collect();
        let decisions: Vec<Decision> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(decisions.windows(2).all(|w| w[0] == w[1]));

        // one decision recorded, one commit applied
        assert_eq!(ledger.history().decisions().len(), 1);
        let err = governance.cast_vote(id, &voter(1), VoteChoice::Against).unwrap_err();
        assert!(matches!(
            err,
            GovernanceError::InvalidVote {
                reason: InvalidVoteReason::AlreadyFinalized,
                ..
            }
        ));
    }

    #[test]
    fn test_due_proposals_and_metrics() {
        let ledger = ledger_with(2);
        let governance = GovernanceLedger::new(GovernanceConfig::default(), ledger);
        let slow = governance
            .create_proposal("slow", DecisionScope::Bioregional, vec![], &voter(0), false)
            .unwrap();
        let fast = governance
            .create_proposal("fast", DecisionScope::Bioregional, vec![], &voter(0), true)
            .unwrap();
        governance.cast_vote(fast, &voter(1), VoteChoice::For).unwrap();

        assert_eq!(governance.advance_to(3), vec![fast]);
        let decided = governance.finalize_due();
        assert_eq!(decided.len(), 1);
        assert!(decided[0].is_approved());
        assert_eq!(governance.advance_to(8), vec![slow]);

        let decision = governance.finalize(slow).unwrap();
        assert_eq!(
            decision.outcome,
            DecisionOutcome::Rejected(RejectionReason::NoParticipation)
        );

        let metrics = governance.metrics();
        assert_eq!(metrics.proposals, 2);
        assert_eq!(metrics.decided, 2);
        assert_eq!(metrics.open, 0);
        assert!((metrics.approval_rate - 0.5).abs() < 1e-12);
        assert!((metrics.mean_participation - 0.25).abs() < 1e-12);
    }
}

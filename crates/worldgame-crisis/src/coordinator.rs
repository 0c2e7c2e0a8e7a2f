//! CrisisCoordinator - challenge state machine
//!
//! A challenge's response needs are registered in the ledger with origin
//! `Challenge(id)`; the crisis plan replaces exactly those needs' allocations
//! and nothing else. Terminal challenges retire their needs.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};
use worldgame_allocator::AllocationOptimizer;
use worldgame_common::{
    AllocationPlan, Challenge, ChallengeId, ChallengeResolution, ChallengeState, Community,
    CrisisError, Decision, DecisionScope, EntityKind, ImplementationStatus, LedgerError, Need,
    NeedId, NeedOrigin, NeedStatus, PlanKind, ProposalId, ProposedAction, Urgency,
};
use worldgame_governance::GovernanceLedger;
use worldgame_ledger::{HistoryEvent, Ledger, LedgerState};

use crate::complexity::coordination_complexity;
use crate::schedule::ChallengeSpec;
use crate::CrisisConfig;

#[derive(Debug, Default)]
struct CrisisState {
    challenges: BTreeMap<ChallengeId, Challenge>,
    /// Drafted plans awaiting a vote
    drafts: BTreeMap<ChallengeId, AllocationPlan>,
}

pub struct CrisisCoordinator {
    config: CrisisConfig,
    ledger: Arc<Ledger>,
    state: RwLock<CrisisState>,
    next_id: AtomicU64,
}

impl CrisisCoordinator {
    pub fn new(config: CrisisConfig, ledger: Arc<Ledger>) -> Self {
        Self {
            config,
            ledger,
            state: RwLock::new(CrisisState::default()),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CrisisConfig {
        &self.config
    }

    /// Register a new challenge in state Detected
    #[instrument(skip(self, spec), fields(challenge_type = %spec.challenge_type, severity = spec.severity))]
    pub fn detect(&self, spec: ChallengeSpec) -> Result<ChallengeId, CrisisError> {
        if !spec.severity.is_finite() || !(0.0..=1.0).contains(&spec.severity) {
            return Err(CrisisError::InvalidSeverity(spec.severity));
        }
        if spec.affected_regions.is_empty() {
            return Err(CrisisError::NoAffectedRegions);
        }

        let (complexity, day) = self.ledger.read(|state| -> Result<_, LedgerError> {
            for region in &spec.affected_regions {
                if !state.registry.contains_region(region) {
                    return Err(LedgerError::unknown(EntityKind::Region, region));
                }
            }
            Ok((
                coordination_complexity(state, &spec.affected_regions, &self.config.complexity),
                state.day,
            ))
        })?;

        let id = ChallengeId::new(format!(
            "challenge-{:04}",
            self.next_id.fetch_add(1, Ordering::SeqCst)
        ));
        let required_resources = spec
            .required_resources
            .unwrap_or_else(|| spec.challenge_type.requirements(spec.severity));
        let challenge = Challenge {
            id: id.clone(),
            challenge_type: spec.challenge_type,
            severity: spec.severity,
            affected_regions: spec.affected_regions,
            required_resources,
            time_sensitivity: spec.time_sensitivity,
            coordination_complexity: complexity,
            state: ChallengeState::Detected,
            success_probability: 0.0,
            effectiveness: 0.0,
            detected_on: day,
            proposal: None,
            plan: None,
            response_committed: false,
            attempts: 0,
        };

        info!(
            challenge = %id,
            regions = challenge.affected_regions.len(),
            complexity,
            urgency = challenge.urgency(),
            "Detected challenge"
        );
        self.ledger.history().record(
            day,
            HistoryEvent::ChallengeDetected {
                challenge: id.clone(),
                challenge_type: challenge.challenge_type,
                severity: challenge.severity,
                coordination_complexity: complexity,
            },
        );
        self.state.write().challenges.insert(id.clone(), challenge);
        Ok(id)
    }

    pub fn challenge(&self, id: &ChallengeId) -> Result<Challenge, CrisisError> {
        self.state
            .read()
            .challenges
            .get(id)
            .cloned()
            .ok_or_else(|| CrisisError::UnknownChallenge(id.clone()))
    }

    pub fn challenges(&self) -> Vec<Challenge> {
        self.state.read().challenges.values().cloned().collect()
    }

    /// Ids of challenges in `state`
    pub fn in_state(&self, state: ChallengeState) -> Vec<ChallengeId> {
        self.state
            .read()
            .challenges
            .values()
            .filter(|c| c.state == state)
            .map(|c| c.id.clone())
            .collect()
    }

    pub fn urgency(&self, id: &ChallengeId) -> Result<f64, CrisisError> {
        Ok(self.challenge(id)?.urgency())
    }

    /// Register response needs and plan them under crisis ceilings
    #[instrument(skip(self, optimizer))]
    pub async fn draft_response(
        &self,
        id: &ChallengeId,
        optimizer: &AllocationOptimizer,
    ) -> Result<AllocationPlan, CrisisError> {
        let challenge = self.expect_state(id, ChallengeState::Detected, "draft a response")?;

        let needs = self.ledger.read(|state| self.response_needs(state, &challenge));
        for need in needs {
            if self.ledger.read(|state| state.registry.contains_need(&need.id)) {
                debug!(need = %need.id, "Reusing response need from an earlier draft");
                continue;
            }
            self.ledger.register_need(need)?;
        }

        let plan = optimizer
            .optimize(&self.ledger, PlanKind::CrisisResponse(id.clone()))
            .await;

        {
            let mut state = self.state.write();
            if let Some(c) = state.challenges.get_mut(id) {
                c.plan = Some(plan.id);
                c.attempts += 1;
            }
            state.drafts.insert(id.clone(), plan.clone());
        }
        self.transition(id, ChallengeState::ResponseDrafted)?;
        info!(
            challenge = %id,
            plan = %plan.id,
            total = plan.total(),
            confidence = plan.confidence,
            "Drafted crisis response"
        );
        Ok(plan)
    }

    /// One need per affected region, sized by the region's population share
    fn response_needs(&self, state: &LedgerState, challenge: &Challenge) -> Vec<Need> {
        let populations: Vec<u64> = challenge
            .affected_regions
            .iter()
            .map(|r| state.registry.region_population(r))
            .collect();
        let total: u64 = populations.iter().sum();
        let regions = challenge.affected_regions.len() as f64;
        let urgency = Urgency::from_fraction(challenge.urgency());
        let deadline = state.day.saturating_add(challenge.time_sensitivity);

        challenge
            .affected_regions
            .iter()
            .zip(&populations)
            .map(|(region, population)| {
                let share = if total == 0 {
                    1.0 / regions
                } else {
                    *population as f64 / total as f64
                };
                let resilience = state.registry.region_resilience(region);

                let mut need = Need::new(NeedId::for_challenge(&challenge.id, region), urgency)
                    .with_deadline(deadline)
                    .with_origin(NeedOrigin::Challenge(challenge.id.clone()));
                if let Some(anchor) = most_populous(state.registry.communities_in_region(region)) {
                    need = need
                        .with_community(anchor.id.clone(), region.clone())
                        .with_location(anchor.location);
                }
                for (category, quantity) in &challenge.required_resources {
                    need = need.with_requirement(*category, quantity * share);
                }
                need.affected_population = *population;
                need.vulnerability = 1.0 - resilience;
                need.weight = self.config.base_need_weight * (1.0 - resilience) * challenge.severity;
                need
            })
            .collect()
    }

    /// Put the drafted plan to an expedited vote
    #[instrument(skip(self, governance))]
    pub fn open_vote(&self, id: &ChallengeId, governance: &GovernanceLedger) -> Result<ProposalId, CrisisError> {
        let challenge = self.expect_state(id, ChallengeState::ResponseDrafted, "open a vote")?;
        let plan = self
            .state
            .read()
            .drafts
            .get(id)
            .cloned()
            .ok_or_else(|| CrisisError::InvalidTransition {
                challenge: id.clone(),
                state: challenge.state,
                action: "open a vote without a draft",
            })?;

        let first_region = &challenge.affected_regions[0];
        let proposer = self
            .ledger
            .read(|state| most_populous(state.registry.communities_in_region(first_region)).map(|c| c.id.clone()))
            .ok_or_else(|| LedgerError::unknown(EntityKind::Community, format!("any in {}", first_region)))?;

        let scope = DecisionScope::for_region_count(challenge.affected_regions.len());
        let proposal = governance.create_proposal(
            format!("{} response to {}", challenge.challenge_type, id),
            scope,
            vec![ProposedAction::ChallengeResponse {
                challenge: id.clone(),
                plan,
            }],
            &proposer,
            true,
        )?;

        if let Some(c) = self.state.write().challenges.get_mut(id) {
            c.proposal = Some(proposal);
        }
        self.transition(id, ChallengeState::VotingOpen)?;
        Ok(proposal)
    }

    /// Score a finished vote and move the challenge on
    #[instrument(skip(self, decision), fields(proposal = %decision.proposal))]
    pub fn evaluate(&self, id: &ChallengeId, decision: &Decision) -> Result<ChallengeState, CrisisError> {
        let challenge = self.expect_state(id, ChallengeState::VotingOpen, "evaluate a decision")?;

        if !decision.is_approved() || decision.implementation != ImplementationStatus::Committed {
            info!(
                challenge = %id,
                outcome = ?decision.outcome,
                implementation = ?decision.implementation,
                "Response not implemented, challenge returns to detection"
            );
            self.reset(id);
            return self.transition(id, ChallengeState::Detected);
        }

        let fulfilment = self.ledger.read(|state| fulfilment(state, id));
        let weights = &self.config.effectiveness;
        let effectiveness = (weights.fulfilment * fulfilment
            + weights.participation * decision.participation_rate
            + weights.severity_discount * (1.0 - challenge.severity))
            .clamp(0.0, 1.0);
        let success_probability =
            effectiveness * (1.0 - self.config.complexity_penalty * challenge.coordination_complexity);

        if let Some(c) = self.state.write().challenges.get_mut(id) {
            c.response_committed = true;
            c.effectiveness = effectiveness;
            c.success_probability = success_probability;
        }
        info!(challenge = %id, fulfilment, effectiveness, success_probability, "Evaluated response");

        if success_probability > self.config.success_threshold {
            self.resolve(id, ChallengeState::ResolvedSuccess).map(|r| r.outcome)
        } else if success_probability < self.config.failure_threshold {
            self.resolve(id, ChallengeState::ResolvedFailure).map(|r| r.outcome)
        } else {
            self.reset(id);
            self.transition(id, ChallengeState::Detected)
        }
    }

    /// Count every open challenge down one day, closing those that run out
    pub fn tick(&self) -> Vec<ChallengeResolution> {
        let expiring: Vec<(ChallengeId, ChallengeState)> = {
            let mut state = self.state.write();
            state
                .challenges
                .values_mut()
                .filter(|c| !c.is_resolved())
                .filter_map(|c| {
                    c.time_sensitivity = c.time_sensitivity.saturating_sub(1);
                    if c.time_sensitivity > 0 {
                        return None;
                    }
                    let outcome = if c.response_committed {
                        ChallengeState::ResolvedFailure
                    } else {
                        ChallengeState::Expired
                    };
                    Some((c.id.clone(), outcome))
                })
                .collect()
        };

        expiring
            .into_iter()
            .filter_map(|(id, outcome)| match self.resolve(&id, outcome) {
                Ok(resolution) => Some(resolution),
                Err(e) => {
                    warn!(challenge = %id, error = %e, "Failed to close challenge");
                    None
                }
            })
            .collect()
    }

    /// Enter a terminal state, retire the response needs and record the outcome
    fn resolve(&self, id: &ChallengeId, outcome: ChallengeState) -> Result<ChallengeResolution, CrisisError> {
        self.transition(id, outcome)?;
        let challenge = self.challenge(id)?;
        self.state.write().drafts.remove(id);

        let status = if outcome == ChallengeState::ResolvedSuccess {
            NeedStatus::Satisfied
        } else {
            NeedStatus::Failed
        };
        let needs: Vec<NeedId> = self.ledger.read(|state| {
            let origin = NeedOrigin::Challenge(id.clone());
            state.registry.active_needs_from(&origin).map(|n| n.id.clone()).collect()
        });
        for need in &needs {
            self.ledger.retire_need(need, status)?;
        }

        let resolution = ChallengeResolution {
            challenge: id.clone(),
            challenge_type: challenge.challenge_type,
            outcome,
            effectiveness: challenge.effectiveness,
            success_probability: challenge.success_probability,
            day: self.ledger.day(),
        };
        info!(
            challenge = %id,
            outcome = ?outcome,
            effectiveness = resolution.effectiveness,
            needs = needs.len(),
            "Resolved challenge"
        );
        self.ledger
            .history()
            .record(resolution.day, HistoryEvent::ChallengeResolved(resolution.clone()));
        Ok(resolution)
    }

    fn reset(&self, id: &ChallengeId) {
        let mut state = self.state.write();
        state.drafts.remove(id);
        if let Some(c) = state.challenges.get_mut(id) {
            c.proposal = None;
            c.plan = None;
        }
    }

    fn expect_state(
        &self,
        id: &ChallengeId,
        expected: ChallengeState,
        action: &'static str,
    ) -> Result<Challenge, CrisisError> {
        let challenge = self.challenge(id)?;
        if challenge.state != expected {
            return Err(CrisisError::InvalidTransition {
                challenge: id.clone(),
                state: challenge.state,
                action,
            });
        }
        Ok(challenge)
    }

    fn transition(&self, id: &ChallengeId, to: ChallengeState) -> Result<ChallengeState, CrisisError> {
        let from = {
            let mut state = self.state.write();
            let challenge = state
                .challenges
                .get_mut(id)
                .ok_or_else(|| CrisisError::UnknownChallenge(id.clone()))?;
            std::mem::replace(&mut challenge.state, to)
        };
        debug!(challenge = %id, ?from, ?to, "Challenge transition");
        self.ledger.history().record(
            self.ledger.day(),
            HistoryEvent::ChallengeTransition {
                challenge: id.clone(),
                from,
                to,
            },
        );
        Ok(to)
    }
}

/// First community with the largest population, in id order
fn most_populous(communities: Vec<&Community>) -> Option<&Community> {
    communities
        .into_iter()
        .fold(None, |best: Option<&Community>, c| match best {
            Some(b) if b.population >= c.population => Some(b),
            _ => Some(c),
        })
}

/// Requirement-weighted satisfaction of a challenge's response needs
fn fulfilment(state: &LedgerState, id: &ChallengeId) -> f64 {
    let origin = NeedOrigin::Challenge(id.clone());
    let (weighted, required) = state
        .registry
        .needs()
        .filter(|n| n.origin == origin)
        .fold((0.0, 0.0), |(weighted, required), n| {
            let total = n.total_required();
            (weighted + n.satisfaction * total, required + total)
        });
    if required <= 0.0 {
        return 0.0;
    }
    weighted / required
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldgame_allocator::{CompatibilityModel, OptimizerConfig};
    use worldgame_common::{
        ChallengeType, CommunityId, RegionId, Resource, ResourceCategory, VoteChoice,
    };
    use worldgame_governance::GovernanceConfig;
    use worldgame_ledger::LedgerConfig;

    struct World {
        ledger: Arc<Ledger>,
        crisis: CrisisCoordinator,
        governance: GovernanceLedger,
        optimizer: AllocationOptimizer,
    }

    fn world(with_resources: bool) -> World {
        let ledger = Ledger::new(LedgerConfig::default());
        for (id, region, population) in [("n1", "north", 4000), ("n2", "north", 1000), ("s1", "south", 5000)] {
            ledger
                .register_community(
                    Community::new(id, region, population)
                        .with_governance(0.6, 0.5)
                        .with_disposition(0.7, 0.4),
                )
                .unwrap();
        }
        ledger.connect(&CommunityId::new("n1"), &CommunityId::new("s1"), 0.9).unwrap();
        if with_resources {
            for category in ResourceCategory::ALL {
                ledger
                    .register_resource(Resource::new(format!("{}-pool", category), category, 5000.0))
                    .unwrap();
            }
        }
        let ledger = Arc::new(ledger);
        World {
            crisis: CrisisCoordinator::new(CrisisConfig::default(), ledger.clone()),
            governance: GovernanceLedger::new(GovernanceConfig::default(), ledger.clone()),
            optimizer: AllocationOptimizer::new(OptimizerConfig::default(), CompatibilityModel::default()),
            ledger,
        }
    }

    fn spec(severity: f64, regions: &[&str]) -> ChallengeSpec {
        ChallengeSpec {
            challenge_type: ChallengeType::Pandemic,
            severity,
            affected_regions: regions.iter().map(|r| RegionId::new(*r)).collect(),
            time_sensitivity: 30,
            required_resources: None,
        }
    }

    async fn vote_all(world: &World, id: &ChallengeId, choice: VoteChoice) -> Decision {
        world.crisis.draft_response(id, &world.optimizer).await.unwrap();
        let proposal = world.crisis.open_vote(id, &world.governance).unwrap();
        for voter in world.governance.proposal(proposal).unwrap().eligible_voters {
            world.governance.cast_vote(proposal, &voter, choice).unwrap();
        }
        world.governance.finalize(proposal).unwrap()
    }

    #[test]
    fn test_detect_validates_input() {
        let world = world(false);
        assert_eq!(
            world.crisis.detect(spec(1.5, &["north"])).unwrap_err(),
            CrisisError::InvalidSeverity(1.5)
        );
        assert_eq!(
            world.crisis.detect(spec(0.5, &[])).unwrap_err(),
            CrisisError::NoAffectedRegions
        );
        let err = world.crisis.detect(spec(0.5, &["atlantis"])).unwrap_err();
        assert!(matches!(err, CrisisError::Ledger(ref e) if e.is_unknown_entity()));

        let id = world.crisis.detect(spec(0.5, &["north", "south"])).unwrap();
        let challenge = world.crisis.challenge(&id).unwrap();
        assert_eq!(challenge.state, ChallengeState::Detected);
        assert_eq!(challenge.required_resources[&ResourceCategory::HumanCapacity], 500.0);
        assert!(challenge.coordination_complexity > 0.0 && challenge.coordination_complexity <= 1.0);
    }

    #[tokio::test]
    async fn test_draft_registers_one_need_per_region() {
        let world = world(true);
        let id = world.crisis.detect(spec(0.8, &["north", "south"])).unwrap();
        let plan = world.crisis.draft_response(&id, &world.optimizer).await.unwrap();

        assert!(plan.is_crisis_response());
        assert_eq!(plan.covered_needs.len(), 2);
        let north = world
            .ledger
            .need(&NeedId::for_challenge(&id, &RegionId::new("north")))
            .unwrap();
        // north holds half of the affected population
        assert!((north.requirement(ResourceCategory::HumanCapacity) - 400.0).abs() < 1e-9);
        assert_eq!(north.community, Some(CommunityId::new("n1")));
        assert!((north.weight - 0.6 * 0.8).abs() < 1e-12);
        assert_eq!(north.origin, NeedOrigin::Challenge(id.clone()));
        assert_eq!(world.crisis.challenge(&id).unwrap().state, ChallengeState::ResponseDrafted);

        // drafting twice is a state error
        let err = world.crisis.draft_response(&id, &world.optimizer).await.unwrap_err();
        assert!(matches!(err, CrisisError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_unfunded_severe_crisis_fails() {
        let world = world(false);
        let id = world.crisis.detect(spec(0.9, &["north"])).unwrap();
        let decision = vote_all(&world, &id, VoteChoice::For).await;
        assert!(decision.is_approved());

        let outcome = world.crisis.evaluate(&id, &decision).unwrap();
        let challenge = world.crisis.challenge(&id).unwrap();
        assert!(challenge.effectiveness < 0.3);
        assert_ne!(outcome, ChallengeState::ResolvedSuccess);
        assert_eq!(outcome, ChallengeState::ResolvedFailure);

        // response needs are retired as failed
        let need = world
            .ledger
            .need(&NeedId::for_challenge(&id, &RegionId::new("north")))
            .unwrap();
        assert_eq!(need.status, NeedStatus::Failed);
        assert_eq!(world.ledger.history().resolutions().len(), 1);
    }

    #[tokio::test]
    async fn test_funded_crisis_succeeds() {
        let world = world(true);
        let id = world.crisis.detect(spec(0.3, &["north"])).unwrap();
        let decision = vote_all(&world, &id, VoteChoice::For).await;

        let outcome = world.crisis.evaluate(&id, &decision).unwrap();
        assert_eq!(outcome, ChallengeState::ResolvedSuccess);
        let need = world
            .ledger
            .need(&NeedId::for_challenge(&id, &RegionId::new("north")))
            .unwrap();
        assert_eq!(need.status, NeedStatus::Satisfied);
        // retired needs hold nothing
        let held: f64 = world.ledger.read(|s| s.resources.iter().map(|r| r.allocated_total()).sum());
        assert_eq!(held, 0.0);
    }

    #[tokio::test]
    async fn test_rejection_returns_to_detected() {
        let world = world(true);
        let id = world.crisis.detect(spec(0.5, &["north"])).unwrap();
        let decision = vote_all(&world, &id, VoteChoice::Against).await;
        assert!(!decision.is_approved());

        assert_eq!(world.crisis.evaluate(&id, &decision).unwrap(), ChallengeState::Detected);
        let challenge = world.crisis.challenge(&id).unwrap();
        assert_eq!(challenge.proposal, None);
        assert!(!challenge.response_committed);

        // a second cycle reuses the registered needs
        let plan = world.crisis.draft_response(&id, &world.optimizer).await.unwrap();
        assert_eq!(plan.covered_needs.len(), 1);
        assert_eq!(world.crisis.challenge(&id).unwrap().attempts, 2);
    }

    #[test]
    fn test_tick_expires_untouched_challenge() {
        let world = world(false);
        let mut short = spec(0.5, &["south"]);
        short.time_sensitivity = 2;
        let id = world.crisis.detect(short).unwrap();

        assert!(world.crisis.tick().is_empty());
        let resolved = world.crisis.tick();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].outcome, ChallengeState::Expired);
        assert!(world.crisis.challenge(&id).unwrap().is_resolved());
        // terminal challenges no longer count down
        assert!(world.crisis.tick().is_empty());
    }
}

//! Governance records: proposals, ballots and decisions

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::ids::{ChallengeId, CommunityId, Day, ProposalId};
use crate::types::plan::AllocationPlan;

/// Reach of a proposal, which fixes both the electorate and the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionScope {
    Local,
    Bioregional,
    Continental,
    Planetary,
}

impl DecisionScope {
    /// Scope for a response touching `regions` bioregions
    pub fn for_region_count(regions: usize) -> Self {
        match regions {
            0 | 1 => DecisionScope::Bioregional,
            2..=3 => DecisionScope::Continental,
            _ => DecisionScope::Planetary,
        }
    }
}

impl std::fmt::Display for DecisionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionScope::Local => write!(f, "local"),
            DecisionScope::Bioregional => write!(f, "bioregional"),
            DecisionScope::Continental => write!(f, "continental"),
            DecisionScope::Planetary => write!(f, "planetary"),
        }
    }
}

/// Action a proposal would implement on approval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposedAction {
    ResourceAllocation(AllocationPlan),
    ChallengeResponse {
        challenge: ChallengeId,
        plan: AllocationPlan,
    },
}

impl ProposedAction {
    pub fn plan(&self) -> &AllocationPlan {
        match self {
            ProposedAction::ResourceAllocation(plan) => plan,
            ProposedAction::ChallengeResponse { plan, .. } => plan,
        }
    }

    pub fn challenge(&self) -> Option<&ChallengeId> {
        match self {
            ProposedAction::ResourceAllocation(_) => None,
            ProposedAction::ChallengeResponse { challenge, .. } => Some(challenge),
        }
    }
}

/// Ballot choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteChoice {
    For,
    Against,
    Abstain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    #[default]
    Open,
    Finalized,
}

/// Proposal awaiting or past ratification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub title: String,
    pub scope: DecisionScope,
    pub actions: Vec<ProposedAction>,
    pub proposer: CommunityId,
    pub created_on: Day,
    /// Last day on which ballots are accepted
    pub deadline: Day,
    pub expedited: bool,
    pub eligible_voters: BTreeSet<CommunityId>,
    pub ballots: BTreeMap<CommunityId, VoteChoice>,
    pub status: ProposalStatus,
}

impl Proposal {
    pub fn is_open(&self) -> bool {
        self.status == ProposalStatus::Open
    }

    pub fn is_eligible(&self, voter: &CommunityId) -> bool {
        self.eligible_voters.contains(voter)
    }

    /// Share of the electorate that cast a ballot
    pub fn participation_rate(&self) -> f64 {
        if self.eligible_voters.is_empty() {
            return 0.0;
        }
        self.ballots.len() as f64 / self.eligible_voters.len() as f64
    }
}

/// Raw and weighted ballot counts
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VoteTally {
    pub for_count: usize,
    pub against_count: usize,
    pub abstain_count: usize,
    pub weighted_for: f64,
    pub weighted_against: f64,
    pub weighted_abstain: f64,
    /// Sum of all ballot weights, abstentions included
    pub total_weighted: f64,
}

impl VoteTally {
    pub fn record(&mut self, choice: VoteChoice, weight: f64) {
        match choice {
            VoteChoice::For => {
                self.for_count += 1;
                self.weighted_for += weight;
            }
            VoteChoice::Against => {
                self.against_count += 1;
                self.weighted_against += weight;
            }
            VoteChoice::Abstain => {
                self.abstain_count += 1;
                self.weighted_abstain += weight;
            }
        }
        self.total_weighted += weight;
    }

    pub fn ballots(&self) -> usize {
        self.for_count + self.against_count + self.abstain_count
    }

    /// Weighted support over total weighted participation
    pub fn for_fraction(&self) -> f64 {
        if self.total_weighted <= 0.0 {
            return 0.0;
        }
        self.weighted_for / self.total_weighted
    }

    pub fn against_fraction(&self) -> f64 {
        if self.total_weighted <= 0.0 {
            return 0.0;
        }
        self.weighted_against / self.total_weighted
    }
}

/// Why a proposal failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Nobody voted
    NoParticipation,
    /// Weighted opposition alone reached the threshold
    Opposed,
    /// Support fell short of the threshold
    ThresholdNotMet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOutcome {
    Approved,
    Rejected(RejectionReason),
}

impl DecisionOutcome {
    pub fn is_approved(&self) -> bool {
        matches!(self, DecisionOutcome::Approved)
    }
}

/// What happened to the proposal's plan after the vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImplementationStatus {
    #[default]
    Pending,
    Committed,
    Discarded,
    Failed,
}

/// Final, immutable result of a proposal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub proposal: ProposalId,
    pub scope: DecisionScope,
    pub tally: VoteTally,
    pub for_fraction: f64,
    pub threshold: f64,
    pub outcome: DecisionOutcome,
    pub implementation: ImplementationStatus,
    /// Ballots cast over eligible voters
    pub participation_rate: f64,
    pub decided_on: Day,
}

impl Decision {
    pub fn is_approved(&self) -> bool {
        self.outcome.is_approved()
    }
}

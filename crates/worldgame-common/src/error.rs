//! Error types for the World Game engine
//!
//! Each layer has its own enum; [`WorldGameError`] unifies them. Allocation
//! errors are recovered inside the optimizer, governance errors are returned to
//! callers as values, and unknown references fail fast everywhere.

use thiserror::Error;

use crate::types::challenge::ChallengeState;
use crate::types::ids::{ChallengeId, CommunityId, Day, ProposalId, ResourceId};

/// Result type alias using WorldGameError
pub type Result<T> = std::result::Result<T, WorldGameError>;

/// Unified error type for engine operations
#[derive(Debug, Error)]
pub enum WorldGameError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Allocation error: {0}")]
    Allocation(#[from] AllocationError),

    #[error("Governance error: {0}")]
    Governance(#[from] GovernanceError),

    #[error("Crisis error: {0}")]
    Crisis(#[from] CrisisError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

impl WorldGameError {
    /// True when the error is a reference to an entity the ledger does not hold.
    pub fn is_unknown_entity(&self) -> bool {
        match self {
            WorldGameError::Ledger(e) => e.is_unknown_entity(),
            WorldGameError::Governance(GovernanceError::Ledger(e)) => e.is_unknown_entity(),
            WorldGameError::Governance(GovernanceError::UnknownProposal(_)) => true,
            WorldGameError::Crisis(CrisisError::Ledger(e)) => e.is_unknown_entity(),
            WorldGameError::Crisis(CrisisError::UnknownChallenge(_)) => true,
            _ => false,
        }
    }
}

/// Kind of entity referenced by an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Resource,
    Need,
    Community,
    Region,
    Challenge,
    Proposal,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Resource => write!(f, "resource"),
            EntityKind::Need => write!(f, "need"),
            EntityKind::Community => write!(f, "community"),
            EntityKind::Region => write!(f, "region"),
            EntityKind::Challenge => write!(f, "challenge"),
            EntityKind::Proposal => write!(f, "proposal"),
        }
    }
}

/// Resource ledger and demand registry errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Unknown {kind}: {id}")]
    UnknownEntity { kind: EntityKind, id: String },

    #[error("Duplicate {kind}: {id}")]
    DuplicateEntity { kind: EntityKind, id: String },

    #[error("Insufficient resource {resource_id}: requested {requested:.3}, available {available:.3}")]
    InsufficientResource {
        resource_id: ResourceId,
        requested: f64,
        available: f64,
    },

    #[error("Invalid {kind} record {id}: {reason}")]
    InvalidRecord {
        kind: EntityKind,
        id: String,
        reason: String,
    },
}

impl LedgerError {
    pub fn unknown(kind: EntityKind, id: impl std::fmt::Display) -> Self {
        LedgerError::UnknownEntity {
            kind,
            id: id.to_string(),
        }
    }

    pub fn duplicate(kind: EntityKind, id: impl std::fmt::Display) -> Self {
        LedgerError::DuplicateEntity {
            kind,
            id: id.to_string(),
        }
    }

    pub fn invalid(kind: EntityKind, id: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        LedgerError::InvalidRecord {
            kind,
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_unknown_entity(&self) -> bool {
        matches!(self, LedgerError::UnknownEntity { .. })
    }
}

/// Optimizer errors, recovered locally by strategy fallback
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AllocationError {
    #[error("Infeasible allocation: {0}")]
    InfeasibleAllocation(String),

    #[error("Solver gave up after {iterations} pivots")]
    SolverFailure { iterations: usize },
}

/// Why a ballot was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidVoteReason {
    /// Voter is not in the proposal's eligible set
    Ineligible,
    /// Voting window closed
    DeadlinePassed { deadline: Day, day: Day },
    /// Proposal already produced a decision
    AlreadyFinalized,
}

impl std::fmt::Display for InvalidVoteReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidVoteReason::Ineligible => write!(f, "voter is not eligible"),
            InvalidVoteReason::DeadlinePassed { deadline, day } => {
                write!(f, "deadline day {} passed (now day {})", deadline, day)
            }
            InvalidVoteReason::AlreadyFinalized => write!(f, "proposal already finalized"),
        }
    }
}

/// Governance errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GovernanceError {
    #[error("Invalid vote by {voter} on {proposal}: {reason}")]
    InvalidVote {
        proposal: ProposalId,
        voter: CommunityId,
        reason: InvalidVoteReason,
    },

    #[error("Unknown proposal: {0}")]
    UnknownProposal(ProposalId),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Crisis coordinator errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CrisisError {
    #[error("Unknown challenge: {0}")]
    UnknownChallenge(ChallengeId),

    #[error("Challenge {challenge} cannot {action} while {state:?}")]
    InvalidTransition {
        challenge: ChallengeId,
        state: ChallengeState,
        action: &'static str,
    },

    #[error("Severity must lie in [0, 1], got {0}")]
    InvalidSeverity(f64),

    #[error("Challenge must affect at least one region")]
    NoAffectedRegions,

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Governance(#[from] GovernanceError),
}

impl From<serde_json::Error> for WorldGameError {
    fn from(err: serde_json::Error) -> Self {
        WorldGameError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for WorldGameError {
    fn from(err: std::io::Error) -> Self {
        WorldGameError::Storage(err.to_string())
    }
}

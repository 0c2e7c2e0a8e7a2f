//! # World Game Common
//!
//! Shared records, identifiers and errors for the World Game coordination engine.
//!
//! ## Core Types
//!
//! - [`Resource`]: categorized planetary resource with capacity and thresholds
//! - [`Need`]: demand record with per-category requirements and urgency
//! - [`Community`]: population node with participation and decision weight
//! - [`Challenge`]: crisis requiring a coordinated response
//! - [`Proposal`]/[`Decision`]: governance records
//! - [`AllocationPlan`]: optimizer output with quality scores and confidence
//!
//! ## Randomness
//!
//! - [`rng`]: seed resolution and seeded generators; every random draw in the
//!   engine flows from an explicit, logged seed

pub mod error;
pub mod rng;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{
    AllocationError, CrisisError, EntityKind, GovernanceError, InvalidVoteReason, LedgerError,
    Result, WorldGameError,
};
pub use types::{
    challenge::{Challenge, ChallengeResolution, ChallengeState, ChallengeType},
    community::Community,
    geo::Location,
    governance::{
        Decision, DecisionOutcome, DecisionScope, ImplementationStatus, Proposal, ProposalStatus,
        ProposedAction, RejectionReason, VoteChoice, VoteTally,
    },
    ids::{ChallengeId, CommunityId, Day, NeedId, PlanId, ProposalId, RegionId, ResourceId},
    need::{Need, NeedOrigin, NeedStatus, Urgency},
    plan::{AllocationPlan, PlanKind, PlanScores, StrategyKind},
    resource::{Renewability, Resource, ResourceCategory},
};

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default share of capacity considered safe to allocate
pub const DEFAULT_SUSTAINABILITY_THRESHOLD: f64 = 0.8;

/// Default share of capacity beyond which usage is unsafe
pub const DEFAULT_CRITICAL_THRESHOLD: f64 = 0.95;

/// Mean Earth radius used for great-circle distances
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Floor and ceiling of the rolling sustainability score
pub const MIN_SUSTAINABILITY_SCORE: f64 = 0.1;
pub const MAX_SUSTAINABILITY_SCORE: f64 = 1.0;

/// Quantities below this are treated as zero allocations
pub const ALLOCATION_EPSILON: f64 = 1e-9;

//! Ballot weighting and the decision rule

use worldgame_common::{Community, DecisionOutcome, RejectionReason, VoteTally};

use crate::VoteWeights;

/// Weight of one community's ballot
pub fn vote_weight(community: &Community, weights: &VoteWeights) -> f64 {
    let population = (community.population.max(1) as f64).ln();
    population * weights.population
        + community.participation_level * weights.participation
        + community.decision_weight * weights.decision_weight
}

/// Outcome of a tally against a threshold
///
/// Support is measured over the whole weighted turnout, abstentions included.
pub fn decide(tally: &VoteTally, threshold: f64) -> DecisionOutcome {
    if tally.ballots() == 0 || tally.total_weighted <= 0.0 {
        return DecisionOutcome::Rejected(RejectionReason::NoParticipation);
    }
    if tally.for_fraction() >= threshold {
        DecisionOutcome::Approved
    } else if tally.against_fraction() >= threshold {
        DecisionOutcome::Rejected(RejectionReason::Opposed)
    } else {
        DecisionOutcome::Rejected(RejectionReason::ThresholdNotMet)
    }
}

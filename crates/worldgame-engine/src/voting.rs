//! Simulated ballots
//!
//! The engine does not model community psychology; a [`VotingBehavior`] stands
//! in for it and decides each eligible community's ballot.

use rand::rngs::StdRng;
use rand::Rng;
use worldgame_common::rng::seeded_rng;
use worldgame_common::{Community, Proposal, VoteChoice};

/// Source of ballots for simulated communities
pub trait VotingBehavior: Send {
    /// Ballot of `community` on `proposal`, or `None` to stay away
    fn ballot(&mut self, community: &Community, proposal: &Proposal) -> Option<VoteChoice>;
}

/// Seeded ballots driven by community disposition
///
/// A community turns out with probability `participation_level`, then votes
/// for with probability `cooperation_level` (raised for expedited crisis
/// proposals), otherwise splits between against and abstain.
pub struct SeededVoting {
    rng: StdRng,
    /// Extra support for expedited proposals
    crisis_solidarity: f64,
}

impl SeededVoting {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: seeded_rng(seed),
            crisis_solidarity: 0.2,
        }
    }

    pub fn with_crisis_solidarity(mut self, solidarity: f64) -> Self {
        self.crisis_solidarity = solidarity.clamp(0.0, 1.0);
        self
    }
}

impl VotingBehavior for SeededVoting {
    fn ballot(&mut self, community: &Community, proposal: &Proposal) -> Option<VoteChoice> {
        if !self.rng.gen_bool(community.participation_level.clamp(0.0, 1.0)) {
            return None;
        }
        let mut support = community.cooperation_level;
        if proposal.expedited {
            support += self.crisis_solidarity;
        }
        if self.rng.gen_bool(support.clamp(0.0, 1.0)) {
            Some(VoteChoice::For)
        } else if self.rng.gen_bool(0.5) {
            Some(VoteChoice::Against)
        } else {
            Some(VoteChoice::Abstain)
        }
    }
}

/// Every eligible community votes the same way
#[derive(Debug, Clone, Copy)]
pub struct Unanimous(pub VoteChoice);

impl VotingBehavior for Unanimous {
    fn ballot(&mut self, _community: &Community, _proposal: &Proposal) -> Option<VoteChoice> {
        Some(self.0)
    }
}

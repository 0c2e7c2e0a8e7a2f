//! Challenge (crisis) records
//!
//! ## Lifecycle
//!
//! ```text
//! Detected → ResponseDrafted → VotingOpen → ResolvedSuccess
//!    ↑                              │      → ResolvedFailure
//!    └──────── retry ───────────────┘      → Expired
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::ids::{ChallengeId, Day, PlanId, ProposalId, RegionId};
use crate::types::resource::ResourceCategory;

/// Kind of planetary challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeType {
    ClimateCrisis,
    ResourceScarcity,
    EcosystemCollapse,
    SocialInequality,
    TechnologicalDisruption,
    Pandemic,
    NaturalDisaster,
    EconomicInstability,
}

impl ChallengeType {
    /// Resource requirements per unit severity
    pub fn requirement_template(&self) -> Vec<(ResourceCategory, f64)> {
        use ResourceCategory::*;
        match self {
            ChallengeType::ClimateCrisis => vec![
                (Energy, 1000.0),
                (Technology, 500.0),
                (HumanCapacity, 800.0),
                (Knowledge, 300.0),
            ],
            ChallengeType::ResourceScarcity => vec![
                (Materials, 800.0),
                (Technology, 400.0),
                (HumanCapacity, 600.0),
                (Knowledge, 200.0),
            ],
            ChallengeType::EcosystemCollapse => vec![
                (EcosystemHealth, 50.0),
                (Knowledge, 400.0),
                (HumanCapacity, 700.0),
                (Materials, 300.0),
            ],
            ChallengeType::Pandemic => vec![
                (HumanCapacity, 1000.0),
                (Knowledge, 600.0),
                (Materials, 400.0),
                (Technology, 300.0),
            ],
            ChallengeType::NaturalDisaster => vec![
                (HumanCapacity, 800.0),
                (Materials, 600.0),
                (Food, 400.0),
                (Water, 500.0),
            ],
            ChallengeType::SocialInequality
            | ChallengeType::TechnologicalDisruption
            | ChallengeType::EconomicInstability => vec![(HumanCapacity, 500.0), (Knowledge, 200.0)],
        }
    }

    /// Template requirements scaled by severity
    pub fn requirements(&self, severity: f64) -> BTreeMap<ResourceCategory, f64> {
        self.requirement_template()
            .into_iter()
            .map(|(category, base)| (category, base * severity))
            .collect()
    }
}

impl std::fmt::Display for ChallengeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ChallengeType::ClimateCrisis => "climate_crisis",
            ChallengeType::ResourceScarcity => "resource_scarcity",
            ChallengeType::EcosystemCollapse => "ecosystem_collapse",
            ChallengeType::SocialInequality => "social_inequality",
            ChallengeType::TechnologicalDisruption => "technological_disruption",
            ChallengeType::Pandemic => "pandemic",
            ChallengeType::NaturalDisaster => "natural_disaster",
            ChallengeType::EconomicInstability => "economic_instability",
        };
        f.write_str(name)
    }
}

/// Resolution state of a challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeState {
    #[default]
    Detected,
    ResponseDrafted,
    VotingOpen,
    ResolvedSuccess,
    ResolvedFailure,
    Expired,
}

impl ChallengeState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChallengeState::ResolvedSuccess | ChallengeState::ResolvedFailure | ChallengeState::Expired
        )
    }
}

/// Crisis requiring a coordinated response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: ChallengeId,
    pub challenge_type: ChallengeType,

    /// Severity in [0, 1]
    pub severity: f64,

    pub affected_regions: Vec<RegionId>,

    /// Total requirement per category across all affected regions
    pub required_resources: BTreeMap<ResourceCategory, f64>,

    /// Days left before the challenge lapses
    pub time_sensitivity: u32,

    /// Coordination complexity in [0, 1]
    pub coordination_complexity: f64,

    pub state: ChallengeState,

    /// Success probability of the last evaluated response
    pub success_probability: f64,

    /// Effectiveness of the last evaluated response
    pub effectiveness: f64,

    pub detected_on: Day,

    /// Proposal currently ratifying a response
    pub proposal: Option<ProposalId>,

    /// Plan drafted for the current response
    pub plan: Option<PlanId>,

    /// Whether any response plan was ever written to the ledger
    pub response_committed: bool,

    /// Response cycles attempted so far
    pub attempts: u32,
}

impl Challenge {
    /// Urgency blend of remaining time, severity and ease of coordination
    pub fn urgency(&self) -> f64 {
        let time_factor = (1.0 - self.time_sensitivity as f64 / 365.0).max(0.1);
        0.4 * time_factor + 0.4 * self.severity + 0.2 * (1.0 - self.coordination_complexity)
    }

    pub fn is_resolved(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Outcome record appended to history when a challenge ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeResolution {
    pub challenge: ChallengeId,
    pub challenge_type: ChallengeType,
    pub outcome: ChallengeState,
    pub effectiveness: f64,
    pub success_probability: f64,
    pub day: Day,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge(time_sensitivity: u32, severity: f64, complexity: f64) -> Challenge {
        Challenge {
            id: ChallengeId::new("challenge-0000"),
            challenge_type: ChallengeType::Pandemic,
            severity,
            affected_regions: vec![RegionId::new("r1")],
            required_resources: ChallengeType::Pandemic.requirements(severity),
            time_sensitivity,
            coordination_complexity: complexity,
            state: ChallengeState::Detected,
            success_probability: 0.0,
            effectiveness: 0.0,
            detected_on: 0,
            proposal: None,
            plan: None,
            response_committed: false,
            attempts: 0,
        }
    }

    #[test]
    fn test_requirements_scale_with_severity() {
        let req = ChallengeType::NaturalDisaster.requirements(0.5);
        assert_eq!(req[&ResourceCategory::Water], 250.0);
        assert_eq!(req.len(), 4);

        let fallback = ChallengeType::EconomicInstability.requirements(1.0);
        assert_eq!(fallback[&ResourceCategory::HumanCapacity], 500.0);
    }

    #[test]
    fn test_urgency() {
        // time factor floors at 0.1 for long horizons
        let c = challenge(400, 0.5, 0.5);
        assert!((c.urgency() - (0.04 + 0.2 + 0.1)).abs() < 1e-12);

        let c = challenge(0, 1.0, 0.0);
        assert!((c.urgency() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!ChallengeState::VotingOpen.is_terminal());
        assert!(ChallengeState::Expired.is_terminal());
        assert!(challenge(1, 0.1, 0.1).state == ChallengeState::Detected);
    }
}

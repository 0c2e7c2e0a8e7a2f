//! Need records
//!
//! Satisfaction is derived, never set directly:
//!
//! ```text
//! satisfaction = Σ_c min(fulfilled_c, required_c) / Σ_c required_c
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{EntityKind, LedgerError};
use crate::types::geo::Location;
use crate::types::ids::{ChallengeId, CommunityId, Day, NeedId, RegionId};
use crate::types::resource::ResourceCategory;

/// Ordinal urgency from 1 (can wait) to 10 (immediate)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Urgency(u8);

impl Urgency {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    /// Clamp into the 1-10 range
    pub fn new(level: u8) -> Self {
        Self(level.clamp(Self::MIN, Self::MAX))
    }

    /// Map a fraction in [0, 1] onto the ordinal scale
    pub fn from_fraction(fraction: f64) -> Self {
        let level = (fraction.clamp(0.0, 1.0) * Self::MAX as f64).round() as u8;
        Self::new(level)
    }

    pub fn level(&self) -> u8 {
        self.0
    }

    /// Urgency as a fraction of the maximum
    pub fn fraction(&self) -> f64 {
        self.0 as f64 / Self::MAX as f64
    }
}

impl Default for Urgency {
    fn default() -> Self {
        Self(5)
    }
}

impl TryFrom<u8> for Urgency {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&level) {
            Ok(Self(level))
        } else {
            Err(format!("urgency must be between 1 and 10, got {}", level))
        }
    }
}

impl From<Urgency> for u8 {
    fn from(urgency: Urgency) -> Self {
        urgency.0
    }
}

/// Need lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeedStatus {
    #[default]
    Active,
    Satisfied,
    Failed,
}

/// Where a need came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeedOrigin {
    #[default]
    Routine,
    Challenge(ChallengeId),
}

/// Demand record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Need {
    pub id: NeedId,

    #[serde(default)]
    pub location: Location,

    /// Community the need belongs to, if any
    #[serde(default)]
    pub community: Option<CommunityId>,

    /// Region the need belongs to, if any
    #[serde(default)]
    pub region: Option<RegionId>,

    #[serde(default)]
    pub affected_population: u64,

    /// Required quantity per category
    pub requirements: BTreeMap<ResourceCategory, f64>,

    /// Minimum acceptable resource quality per category
    #[serde(default)]
    pub min_quality: BTreeMap<ResourceCategory, f64>,

    #[serde(default)]
    pub urgency: Urgency,

    /// Day after which an unmet need fails
    #[serde(default)]
    pub deadline: Option<Day>,

    /// Vulnerability of the affected population in [0, 1]
    #[serde(default)]
    pub vulnerability: f64,

    /// Relative weight used by the optimizer's priority blend
    #[serde(default = "default_weight")]
    pub weight: f64,

    #[serde(default)]
    pub satisfaction: f64,

    /// Quantity delivered per category by current allocations
    #[serde(default)]
    pub fulfilled: BTreeMap<ResourceCategory, f64>,

    #[serde(default)]
    pub status: NeedStatus,

    #[serde(default)]
    pub origin: NeedOrigin,
}

fn default_weight() -> f64 {
    1.0
}

impl Need {
    pub fn new(id: impl Into<NeedId>, urgency: Urgency) -> Self {
        Self {
            id: id.into(),
            location: Location::default(),
            community: None,
            region: None,
            affected_population: 0,
            requirements: BTreeMap::new(),
            min_quality: BTreeMap::new(),
            urgency,
            deadline: None,
            vulnerability: 0.0,
            weight: 1.0,
            satisfaction: 0.0,
            fulfilled: BTreeMap::new(),
            status: NeedStatus::Active,
            origin: NeedOrigin::Routine,
        }
    }

    pub fn with_requirement(mut self, category: ResourceCategory, quantity: f64) -> Self {
        self.requirements.insert(category, quantity);
        self
    }

    pub fn with_min_quality(mut self, category: ResourceCategory, quality: f64) -> Self {
        self.min_quality.insert(category, quality);
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    pub fn with_community(mut self, community: CommunityId, region: RegionId) -> Self {
        self.community = Some(community);
        self.region = Some(region);
        self
    }

    pub fn with_deadline(mut self, day: Day) -> Self {
        self.deadline = Some(day);
        self
    }

    pub fn with_origin(mut self, origin: NeedOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn requirement(&self, category: ResourceCategory) -> f64 {
        self.requirements.get(&category).copied().unwrap_or(0.0)
    }

    pub fn requires(&self, category: ResourceCategory) -> bool {
        self.requirement(category) > 0.0
    }

    pub fn min_quality_for(&self, category: ResourceCategory) -> f64 {
        self.min_quality.get(&category).copied().unwrap_or(0.0)
    }

    pub fn total_required(&self) -> f64 {
        self.requirements.values().sum()
    }

    pub fn is_active(&self) -> bool {
        self.status == NeedStatus::Active
    }

    pub fn is_challenge_need(&self) -> bool {
        matches!(self.origin, NeedOrigin::Challenge(_))
    }

    /// Replace fulfilled quantities and recompute satisfaction
    pub fn set_fulfilled(&mut self, fulfilled: BTreeMap<ResourceCategory, f64>) {
        self.fulfilled = fulfilled;
        self.satisfaction = self.compute_satisfaction();
    }

    /// Fraction of the requirement covered, counting each category at most up
    /// to its own requirement
    pub fn compute_satisfaction(&self) -> f64 {
        let required = self.total_required();
        if required <= 0.0 {
            return 1.0;
        }
        let covered: f64 = self
            .requirements
            .iter()
            .map(|(category, req)| {
                let got = self.fulfilled.get(category).copied().unwrap_or(0.0).max(0.0);
                got.min(*req)
            })
            .sum();
        (covered / required).clamp(0.0, 1.0)
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        let invalid = |reason: &str| Err(LedgerError::invalid(EntityKind::Need, &self.id, reason));

        if self.requirements.values().any(|q| !q.is_finite() || *q < 0.0) {
            return invalid("requirements must be finite and non-negative");
        }
        if self.min_quality.values().any(|q| !(0.0..=1.0).contains(q)) {
            return invalid("min_quality must lie in [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.vulnerability) {
            return invalid("vulnerability must lie in [0, 1]");
        }
        if !self.weight.is_finite() || self.weight < 0.0 {
            return invalid("weight must be non-negative");
        }
        Ok(())
    }
}

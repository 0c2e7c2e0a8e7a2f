//! Community records

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{EntityKind, LedgerError};
use crate::types::geo::Location;
use crate::types::ids::{CommunityId, RegionId};
use crate::types::resource::ResourceCategory;

/// Population node of the coordination network
///
/// Trust edges are not stored here; they live in the network topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Community {
    pub id: CommunityId,

    #[serde(default)]
    pub name: String,

    /// Bioregion the community belongs to
    pub region: RegionId,

    #[serde(default)]
    pub location: Location,

    pub population: u64,

    /// Daily production per category
    #[serde(default)]
    pub production: BTreeMap<ResourceCategory, f64>,

    /// Daily consumption per category
    #[serde(default)]
    pub consumption: BTreeMap<ResourceCategory, f64>,

    /// Share of governance rounds the community takes part in, [0, 1]
    #[serde(default = "half")]
    pub participation_level: f64,

    /// Assigned decision weight, [0, 1]
    #[serde(default = "half")]
    pub decision_weight: f64,

    /// Willingness to back collective proposals, [0, 1]
    #[serde(default = "half")]
    pub cooperation_level: f64,

    /// Ability to absorb shocks, [0, 1]
    #[serde(default = "half")]
    pub resilience: f64,
}

fn half() -> f64 {
    0.5
}

impl Community {
    pub fn new(id: impl Into<CommunityId>, region: impl Into<RegionId>, population: u64) -> Self {
        let id = id.into();
        Self {
            name: id.to_string(),
            id,
            region: region.into(),
            location: Location::default(),
            population,
            production: BTreeMap::new(),
            consumption: BTreeMap::new(),
            participation_level: 0.5,
            decision_weight: 0.5,
            cooperation_level: 0.5,
            resilience: 0.5,
        }
    }

    pub fn with_governance(mut self, participation_level: f64, decision_weight: f64) -> Self {
        self.participation_level = participation_level;
        self.decision_weight = decision_weight;
        self
    }

    pub fn with_disposition(mut self, cooperation_level: f64, resilience: f64) -> Self {
        self.cooperation_level = cooperation_level;
        self.resilience = resilience;
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    /// Production minus consumption for one category
    pub fn net_balance(&self, category: ResourceCategory) -> f64 {
        let produced = self.production.get(&category).copied().unwrap_or(0.0);
        let consumed = self.consumption.get(&category).copied().unwrap_or(0.0);
        produced - consumed
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        for (name, value) in [
            ("participation_level", self.participation_level),
            ("decision_weight", self.decision_weight),
            ("cooperation_level", self.cooperation_level),
            ("resilience", self.resilience),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(LedgerError::invalid(
                    EntityKind::Community,
                    &self.id,
                    format!("{} must lie in [0, 1]", name),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_net_balance() {
        let mut c = Community::new("c-1", "sahel", 1200);
        c.production.insert(ResourceCategory::Food, 40.0);
        c.consumption.insert(ResourceCategory::Food, 55.0);
        assert_eq!(c.net_balance(ResourceCategory::Food), -15.0);
        assert_eq!(c.net_balance(ResourceCategory::Water), 0.0);
    }

    #[test]
    fn test_validate() {
        assert!(Community::new("c-1", "sahel", 10).validate().is_ok());
        let bad = Community::new("c-2", "sahel", 10).with_governance(1.5, 0.5);
        assert!(bad.validate().is_err());
    }
}

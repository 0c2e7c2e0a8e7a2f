//! Scenario files: the collaborator records a run starts from

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;
use worldgame_common::{Community, Need, Resource, Result};
use worldgame_crisis::ChallengeSchedule;
use worldgame_ledger::{Ledger, TrustLink};

/// Initial records of a run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub communities: Vec<Community>,
    #[serde(default)]
    pub links: Vec<TrustLink>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub needs: Vec<Need>,
    /// Challenge schedule; generated from the run seed when absent
    #[serde(default)]
    pub schedule: Option<ChallengeSchedule>,
}

impl Scenario {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Register every record; communities come first so needs and links can
    /// refer to them
    pub fn load_into(&self, ledger: &Ledger) -> Result<()> {
        for community in &self.communities {
            ledger.register_community(community.clone())?;
        }
        for link in &self.links {
            ledger.connect(&link.a, &link.b, link.trust)?;
        }
        for resource in &self.resources {
            ledger.register_resource(resource.clone())?;
        }
        for need in &self.needs {
            ledger.register_need(need.clone())?;
        }
        info!(
            communities = self.communities.len(),
            links = self.links.len(),
            resources = self.resources.len(),
            needs = self.needs.len(),
            "Loaded scenario"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldgame_common::{ResourceCategory, WorldGameError};
    use worldgame_ledger::LedgerConfig;

    const SCENARIO: &str = r#"{
        "communities": [
            {"id": "oak", "name": "Oak", "region": "north", "population": 1200},
            {"id": "elm", "name": "Elm", "region": "south", "population": 800}
        ],
        "links": [{"a": "oak", "b": "elm", "trust": 0.7}],
        "resources": [
            {"id": "river", "category": "water", "total_available": 1000.0}
        ],
        "needs": [
            {"id": "oak-water", "community": "oak", "urgency": 6,
             "requirements": {"water": 300.0}}
        ]
    }"#;

    #[test]
    fn test_load_scenario() {
        let scenario = Scenario::from_json(SCENARIO).unwrap();
        assert!(scenario.schedule.is_none());

        let ledger = Ledger::new(LedgerConfig::default());
        scenario.load_into(&ledger).unwrap();
        let need = ledger.need(&"oak-water".into()).unwrap();
        assert_eq!(need.region, Some("north".into()));
        assert_eq!(need.requirement(ResourceCategory::Water), 300.0);
        ledger.read(|s| assert_eq!(s.topology.edge_count(), 1));
    }

    #[test]
    fn test_duplicate_records_fail() {
        let mut scenario = Scenario::from_json(SCENARIO).unwrap();
        scenario.resources.push(scenario.resources[0].clone());
        let ledger = Ledger::new(LedgerConfig::default());
        let err = scenario.load_into(&ledger).unwrap_err();
        assert!(matches!(err, WorldGameError::Ledger(_)));
    }

    #[test]
    fn test_malformed_json() {
        let err = Scenario::from_json("{\"resources\": 3}").unwrap_err();
        assert!(matches!(err, WorldGameError::Serialization(_)));
    }
}

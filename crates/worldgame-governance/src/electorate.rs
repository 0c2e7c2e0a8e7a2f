//! Electorate selection by scope

use std::collections::BTreeSet;

use worldgame_common::{CommunityId, DecisionScope, LedgerError};
use worldgame_ledger::LedgerState;

use crate::GovernanceConfig;

/// Communities entitled to vote on a proposal made by `proposer`
///
/// - Local: the proposer alone
/// - Bioregional: every community of the proposer's region
/// - Continental: the proposer's region, then up to `continental_per_region`
///   communities from each neighbouring region in id order, stopping at
///   `continental_max_voters`
/// - Planetary: every community
pub fn eligible_voters(
    state: &LedgerState,
    scope: DecisionScope,
    proposer: &CommunityId,
    config: &GovernanceConfig,
) -> Result<BTreeSet<CommunityId>, LedgerError> {
    let region = state.registry.community(proposer)?.region.clone();

    let voters = match scope {
        DecisionScope::Local => BTreeSet::from([proposer.clone()]),
        DecisionScope::Bioregional => state
            .registry
            .communities_in_region(&region)
            .into_iter()
            .map(|c| c.id.clone())
            .collect(),
        DecisionScope::Continental => {
            let mut voters: BTreeSet<CommunityId> = state
                .registry
                .communities_in_region(&region)
                .into_iter()
                .map(|c| c.id.clone())
                .collect();
            for neighbour in state.topology.neighboring_regions(&region) {
                if voters.len() >= config.continental_max_voters {
                    break;
                }
                let room = config.continental_max_voters - voters.len();
                voters.extend(
                    state
                        .registry
                        .communities_in_region(&neighbour)
                        .into_iter()
                        .take(config.continental_per_region.min(room))
                        .map(|c| c.id.clone()),
                );
            }
            voters
        }
        DecisionScope::Planetary => state.registry.communities().map(|c| c.id.clone()).collect(),
    };
    Ok(voters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldgame_common::Community;
    use worldgame_ledger::{Ledger, LedgerConfig};

    /// Regions r0..r3 with `per_region` communities each; r0 borders r1 and r2
    fn ledger(per_region: usize) -> Ledger {
        let ledger = Ledger::new(LedgerConfig::default());
        for r in 0..4 {
            for c in 0..per_region {
                ledger
                    .register_community(Community::new(format!("r{}-c{:02}", r, c), format!("r{}", r), 1000))
                    .unwrap();
            }
        }
        let hub = CommunityId::new("r0-c00");
        ledger.connect(&hub, &CommunityId::new("r1-c00"), 0.8).unwrap();
        ledger.connect(&hub, &CommunityId::new("r2-c00"), 0.6).unwrap();
        ledger
    }

    #[test]
    fn test_local_and_bioregional() {
        let ledger = ledger(3);
        let config = GovernanceConfig::default();
        let proposer = CommunityId::new("r1-c02");

        let local = ledger.read(|s| eligible_voters(s, DecisionScope::Local, &proposer, &config)).unwrap();
        assert_eq!(local, BTreeSet::from([proposer.clone()]));

        let bioregional = ledger
            .read(|s| eligible_voters(s, DecisionScope::Bioregional, &proposer, &config))
            .unwrap();
        assert_eq!(bioregional.len(), 3);
        assert!(bioregional.iter().all(|c| c.as_str().starts_with("r1-")));
    }

    #[test]
    fn test_continental_takes_neighbours_only() {
        let ledger = ledger(12);
        let config = GovernanceConfig::default();
        let proposer = CommunityId::new("r0-c05");
        let voters = ledger
            .read(|s| eligible_voters(s, DecisionScope::Continental, &proposer, &config))
            .unwrap();

        // 12 home + 10 from r1 + 10 from r2, none from the unconnected r3
        assert_eq!(voters.len(), 32);
        assert!(!voters.iter().any(|c| c.as_str().starts_with("r3-")));
        assert!(voters.contains(&CommunityId::new("r1-c09")));
        assert!(!voters.contains(&CommunityId::new("r1-c10")));
    }

    #[test]
    fn test_continental_cap() {
        let ledger = ledger(30);
        let config = GovernanceConfig {
            continental_max_voters: 35,
            ..GovernanceConfig::default()
        };
        let proposer = CommunityId::new("r0-c00");
        let voters = ledger
            .read(|s| eligible_voters(s, DecisionScope::Continental, &proposer, &config))
            .unwrap();
        assert_eq!(voters.len(), 35);
    }

    #[test]
    fn test_planetary_and_unknown_proposer() {
        let ledger = ledger(2);
        let config = GovernanceConfig::default();
        let all = ledger
            .read(|s| eligible_voters(s, DecisionScope::Planetary, &CommunityId::new("r3-c01"), &config))
            .unwrap();
        assert_eq!(all.len(), 8);

        let err = ledger
            .read(|s| eligible_voters(s, DecisionScope::Planetary, &CommunityId::new("ghost"), &config))
            .unwrap_err();
        assert!(err.is_unknown_entity());
    }
}

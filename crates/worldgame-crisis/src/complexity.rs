//! Coordination complexity of a multi-region response

use worldgame_common::{CommunityId, RegionId};
use worldgame_ledger::LedgerState;

use crate::ComplexityConfig;

/// Complexity in [0, 1] of coordinating `regions`
pub fn coordination_complexity(state: &LedgerState, regions: &[RegionId], config: &ComplexityConfig) -> f64 {
    let region_term = if config.region_span > 0.0 {
        (regions.len() as f64 / config.region_span).min(1.0)
    } else {
        1.0
    };

    let members: Vec<CommunityId> = regions
        .iter()
        .flat_map(|r| state.registry.communities_in_region(r))
        .map(|c| c.id.clone())
        .collect();
    let network_term = state
        .topology
        .mean_path_length(&members, config.disconnected_hops)
        .map(|mean| (mean / config.path_scale).min(1.0))
        .unwrap_or(config.isolated_network_term);

    (config.region_weight * region_term + config.network_weight * network_term).clamp(0.0, 1.0)
}

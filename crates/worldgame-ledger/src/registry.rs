//! DemandRegistry - authoritative store of needs and communities

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;
use worldgame_common::{
    Community, CommunityId, EntityKind, LedgerError, Need, NeedId, NeedOrigin, RegionId,
};

/// Needs and communities keyed by id, with a region index
#[derive(Debug, Clone, Default)]
pub struct DemandRegistry {
    needs: BTreeMap<NeedId, Need>,
    communities: BTreeMap<CommunityId, Community>,
    regions: BTreeMap<RegionId, BTreeSet<CommunityId>>,
}

impl DemandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_community(&mut self, community: Community) -> Result<(), LedgerError> {
        community.validate()?;
        if self.communities.contains_key(&community.id) {
            return Err(LedgerError::duplicate(EntityKind::Community, &community.id));
        }
        self.regions
            .entry(community.region.clone())
            .or_default()
            .insert(community.id.clone());
        debug!(community = %community.id, region = %community.region, "Registered community");
        self.communities.insert(community.id.clone(), community);
        Ok(())
    }

    /// Register a need; a need scoped to a community inherits its region
    pub fn register_need(&mut self, mut need: Need) -> Result<(), LedgerError> {
        need.validate()?;
        if self.needs.contains_key(&need.id) {
            return Err(LedgerError::duplicate(EntityKind::Need, &need.id));
        }
        if let Some(community_id) = &need.community {
            let community = self.community(community_id)?;
            if need.region.is_none() {
                need.region = Some(community.region.clone());
            }
        }
        need.satisfaction = need.compute_satisfaction();
        debug!(need = %need.id, urgency = need.urgency.level(), "Registered need");
        self.needs.insert(need.id.clone(), need);
        Ok(())
    }

    pub fn need(&self, id: &NeedId) -> Result<&Need, LedgerError> {
        self.needs
            .get(id)
            .ok_or_else(|| LedgerError::unknown(EntityKind::Need, id))
    }

    pub fn need_mut(&mut self, id: &NeedId) -> Result<&mut Need, LedgerError> {
        self.needs
            .get_mut(id)
            .ok_or_else(|| LedgerError::unknown(EntityKind::Need, id))
    }

    pub fn contains_need(&self, id: &NeedId) -> bool {
        self.needs.contains_key(id)
    }

    pub fn needs(&self) -> impl Iterator<Item = &Need> {
        self.needs.values()
    }

    pub fn active_needs(&self) -> impl Iterator<Item = &Need> {
        self.needs.values().filter(|n| n.is_active())
    }

    /// Active needs raised by the given origin
    pub fn active_needs_from<'a>(&'a self, origin: &'a NeedOrigin) -> impl Iterator<Item = &'a Need> {
        self.active_needs().filter(move |n| &n.origin == origin)
    }

    pub fn community(&self, id: &CommunityId) -> Result<&Community, LedgerError> {
        self.communities
            .get(id)
            .ok_or_else(|| LedgerError::unknown(EntityKind::Community, id))
    }

    pub fn contains_community(&self, id: &CommunityId) -> bool {
        self.communities.contains_key(id)
    }

    pub fn communities(&self) -> impl Iterator<Item = &Community> {
        self.communities.values()
    }

    pub fn community_count(&self) -> usize {
        self.communities.len()
    }

    pub fn regions(&self) -> impl Iterator<Item = &RegionId> {
        self.regions.keys()
    }

    pub fn contains_region(&self, region: &RegionId) -> bool {
        self.regions.contains_key(region)
    }

    /// Communities of a region in id order
    pub fn communities_in_region(&self, region: &RegionId) -> Vec<&Community> {
        self.regions
            .get(region)
            .map(|ids| ids.iter().filter_map(|id| self.communities.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn region_population(&self, region: &RegionId) -> u64 {
        self.communities_in_region(region)
            .iter()
            .map(|c| c.population)
            .sum()
    }

    /// Mean resilience of a region's communities (0.5 for an empty region)
    pub fn region_resilience(&self, region: &RegionId) -> f64 {
        let members = self.communities_in_region(region);
        if members.is_empty() {
            return 0.5;
        }
        members.iter().map(|c| c.resilience).sum::<f64>() / members.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldgame_common::{ResourceCategory, Urgency};

    fn registry() -> DemandRegistry {
        let mut registry = DemandRegistry::new();
        registry
            .register_community(Community::new("c-1", "andes", 1000).with_disposition(0.5, 0.2))
            .unwrap();
        registry
            .register_community(Community::new("c-2", "andes", 3000).with_disposition(0.5, 0.6))
            .unwrap();
        registry
            .register_community(Community::new("c-3", "sahel", 500))
            .unwrap();
        registry
    }

    #[test]
    fn test_region_index() {
        let registry = registry();
        let andes = RegionId::new("andes");
        assert_eq!(registry.communities_in_region(&andes).len(), 2);
        assert_eq!(registry.region_population(&andes), 4000);
        assert!((registry.region_resilience(&andes) - 0.4).abs() < 1e-12);
        assert_eq!(registry.regions().count(), 2);
    }

    #[test]
    fn test_need_inherits_region() {
        let mut registry = registry();
        let mut need = Need::new("n-1", Urgency::new(6)).with_requirement(ResourceCategory::Food, 10.0);
        need.community = Some(CommunityId::new("c-3"));
        registry.register_need(need).unwrap();
        assert_eq!(
            registry.need(&"n-1".into()).unwrap().region,
            Some(RegionId::new("sahel"))
        );
    }

    #[test]
    fn test_need_with_unknown_community() {
        let mut registry = registry();
        let mut need = Need::new("n-1", Urgency::new(6));
        need.community = Some(CommunityId::new("ghost"));
        assert!(registry.register_need(need).unwrap_err().is_unknown_entity());
        assert!(!registry.contains_need(&"n-1".into()));
    }

    #[test]
    fn test_duplicate_community() {
        let mut registry = registry();
        let err = registry
            .register_community(Community::new("c-1", "andes", 1))
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateEntity { .. }));
    }
}

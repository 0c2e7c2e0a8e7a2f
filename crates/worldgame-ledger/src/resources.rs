//! ResourceLedger - authoritative store of resource capacities

use std::collections::BTreeMap;

use tracing::debug;
use worldgame_common::{EntityKind, LedgerError, Resource, ResourceCategory, ResourceId};

/// Resources keyed by id
#[derive(Debug, Clone, Default)]
pub struct ResourceLedger {
    resources: BTreeMap<ResourceId, Resource>,
    /// Regeneration ceiling as a multiple of registered capacity
    ceiling_factor: f64,
}

impl ResourceLedger {
    pub fn new(ceiling_factor: f64) -> Self {
        Self {
            resources: BTreeMap::new(),
            ceiling_factor,
        }
    }

    /// Register a resource, fixing its regeneration ceiling if unset
    pub fn register(&mut self, mut resource: Resource) -> Result<(), LedgerError> {
        resource.validate()?;
        if self.resources.contains_key(&resource.id) {
            return Err(LedgerError::duplicate(EntityKind::Resource, &resource.id));
        }
        if resource.capacity_ceiling.is_none() {
            resource.capacity_ceiling = Some(resource.total_available * self.ceiling_factor);
        }
        debug!(resource = %resource.id, category = %resource.category, "Registered resource");
        self.resources.insert(resource.id.clone(), resource);
        Ok(())
    }

    pub fn get(&self, id: &ResourceId) -> Result<&Resource, LedgerError> {
        self.resources
            .get(id)
            .ok_or_else(|| LedgerError::unknown(EntityKind::Resource, id))
    }

    pub fn get_mut(&mut self, id: &ResourceId) -> Result<&mut Resource, LedgerError> {
        self.resources
            .get_mut(id)
            .ok_or_else(|| LedgerError::unknown(EntityKind::Resource, id))
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.resources.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Resource> {
        self.resources.values_mut()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn by_category(&self, category: ResourceCategory) -> impl Iterator<Item = &Resource> {
        self.resources.values().filter(move |r| r.category == category)
    }

    /// Allocated share of a resource's capacity
    pub fn utilization(&self, id: &ResourceId) -> Result<f64, LedgerError> {
        Ok(self.get(id)?.utilization())
    }

    /// Wear every resource down by use, grow it by its regeneration rate
    /// capped at its ceiling, and advance rolling sustainability scores
    pub fn apply_daily_regeneration(&mut self) {
        for resource in self.resources.values_mut() {
            resource.deplete();
            resource.regenerate();
            resource.update_sustainability_score();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_sets_ceiling() {
        let mut ledger = ResourceLedger::new(2.0);
        ledger
            .register(Resource::new("w", ResourceCategory::Water, 100.0).with_regeneration(0.5))
            .unwrap();
        assert_eq!(ledger.get(&"w".into()).unwrap().capacity_ceiling, Some(200.0));

        for _ in 0..5 {
            ledger.apply_daily_regeneration();
        }
        assert_eq!(ledger.get(&"w".into()).unwrap().total_available, 200.0);
    }

    #[test]
    fn test_depletion_precedes_regeneration() {
        let mut ledger = ResourceLedger::new(2.0);
        let mut worn = Resource::new("w", ResourceCategory::Water, 100.0)
            .with_regeneration(0.1)
            .with_depletion(0.2);
        worn.allocations.insert("n1".into(), 50.0);
        ledger.register(worn).unwrap();

        ledger.apply_daily_regeneration();
        // 100 - 100 * 0.2 * 0.5 = 90, then grown by 10%
        let w = ledger.get(&"w".into()).unwrap();
        assert!((w.total_available - 99.0).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_and_unknown() {
        let mut ledger = ResourceLedger::new(2.0);
        ledger.register(Resource::new("w", ResourceCategory::Water, 1.0)).unwrap();
        let err = ledger
            .register(Resource::new("w", ResourceCategory::Water, 1.0))
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateEntity { .. }));
        assert!(ledger.utilization(&"missing".into()).unwrap_err().is_unknown_entity());
    }

    #[test]
    fn test_by_category() {
        let mut ledger = ResourceLedger::new(2.0);
        ledger.register(Resource::new("w1", ResourceCategory::Water, 1.0)).unwrap();
        ledger.register(Resource::new("w2", ResourceCategory::Water, 1.0)).unwrap();
        ledger.register(Resource::new("e1", ResourceCategory::Energy, 1.0)).unwrap();
        assert_eq!(ledger.by_category(ResourceCategory::Water).count(), 2);
        assert_eq!(ledger.len(), 3);
    }
}

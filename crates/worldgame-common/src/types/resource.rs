//! Resource records
//!
//! A resource is a categorized pool of capacity with per-need allocations.
//! Utilization drives two predicates:
//!
//! ```text
//! is_sustainable ⇔ utilization ≤ sustainability_threshold
//! is_critical    ⇔ utilization ≥ critical_threshold
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{EntityKind, LedgerError};
use crate::types::geo::Location;
use crate::types::ids::{NeedId, ResourceId};
use crate::{
    ALLOCATION_EPSILON, DEFAULT_CRITICAL_THRESHOLD, DEFAULT_SUSTAINABILITY_THRESHOLD,
    MAX_SUSTAINABILITY_SCORE, MIN_SUSTAINABILITY_SCORE,
};

/// Resource category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    Energy,
    Water,
    Food,
    Materials,
    Knowledge,
    HumanCapacity,
    EcosystemHealth,
    Technology,
}

impl ResourceCategory {
    pub const ALL: [ResourceCategory; 8] = [
        ResourceCategory::Energy,
        ResourceCategory::Water,
        ResourceCategory::Food,
        ResourceCategory::Materials,
        ResourceCategory::Knowledge,
        ResourceCategory::HumanCapacity,
        ResourceCategory::EcosystemHealth,
        ResourceCategory::Technology,
    ];
}

impl std::fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceCategory::Energy => write!(f, "energy"),
            ResourceCategory::Water => write!(f, "water"),
            ResourceCategory::Food => write!(f, "food"),
            ResourceCategory::Materials => write!(f, "materials"),
            ResourceCategory::Knowledge => write!(f, "knowledge"),
            ResourceCategory::HumanCapacity => write!(f, "human_capacity"),
            ResourceCategory::EcosystemHealth => write!(f, "ecosystem_health"),
            ResourceCategory::Technology => write!(f, "technology"),
        }
    }
}

/// How a resource replenishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Renewability {
    #[default]
    Renewable,
    LimitedRenewable,
    NonRenewable,
}

impl Renewability {
    /// Multiplier applied to the sustainability score of allocations
    pub fn factor(&self) -> f64 {
        match self {
            Renewability::Renewable => 1.2,
            Renewability::LimitedRenewable => 1.0,
            Renewability::NonRenewable => 0.8,
        }
    }
}

/// Categorized planetary resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub category: ResourceCategory,

    /// Current total capacity
    pub total_available: f64,

    /// Fractional capacity growth per day
    #[serde(default)]
    pub regeneration_rate: f64,

    /// Fractional capacity lost per day at full utilization
    #[serde(default)]
    pub depletion_rate: f64,

    /// Share of capacity considered safe to allocate
    #[serde(default = "default_sustainability_threshold")]
    pub sustainability_threshold: f64,

    /// Share of capacity beyond which usage is unsafe
    #[serde(default = "default_critical_threshold")]
    pub critical_threshold: f64,

    /// Current allocation per need
    #[serde(default)]
    pub allocations: BTreeMap<NeedId, f64>,

    #[serde(default)]
    pub location: Location,

    /// Quality in [0, 1]
    #[serde(default = "one")]
    pub quality: f64,

    /// Ease of access in [0, 1]
    #[serde(default = "one")]
    pub accessibility: f64,

    /// Environmental impact per unit in [0, 1]
    #[serde(default)]
    pub environmental_impact: f64,

    /// Extraction cost per unit
    #[serde(default)]
    pub extraction_cost: f64,

    #[serde(default)]
    pub renewability: Renewability,

    /// Upper bound for regeneration; filled in at registration when absent
    #[serde(default)]
    pub capacity_ceiling: Option<f64>,

    /// Rolling sustainability score in [0.1, 1]
    #[serde(default = "one")]
    pub sustainability_score: f64,
}

fn default_sustainability_threshold() -> f64 {
    DEFAULT_SUSTAINABILITY_THRESHOLD
}

fn default_critical_threshold() -> f64 {
    DEFAULT_CRITICAL_THRESHOLD
}

fn one() -> f64 {
    1.0
}

impl Resource {
    /// Create a resource with default thresholds and neutral attributes
    pub fn new(id: impl Into<ResourceId>, category: ResourceCategory, total_available: f64) -> Self {
        Self {
            id: id.into(),
            category,
            total_available,
            regeneration_rate: 0.0,
            depletion_rate: 0.0,
            sustainability_threshold: DEFAULT_SUSTAINABILITY_THRESHOLD,
            critical_threshold: DEFAULT_CRITICAL_THRESHOLD,
            allocations: BTreeMap::new(),
            location: Location::default(),
            quality: 1.0,
            accessibility: 1.0,
            environmental_impact: 0.0,
            extraction_cost: 0.0,
            renewability: Renewability::Renewable,
            capacity_ceiling: None,
            sustainability_score: 1.0,
        }
    }

    pub fn with_thresholds(mut self, sustainability: f64, critical: f64) -> Self {
        self.sustainability_threshold = sustainability;
        self.critical_threshold = critical;
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    pub fn with_regeneration(mut self, rate: f64) -> Self {
        self.regeneration_rate = rate;
        self
    }

    pub fn with_quality(mut self, quality: f64, accessibility: f64) -> Self {
        self.quality = quality;
        self.accessibility = accessibility;
        self
    }

    pub fn with_impact(mut self, environmental_impact: f64, extraction_cost: f64) -> Self {
        self.environmental_impact = environmental_impact;
        self.extraction_cost = extraction_cost;
        self
    }

    pub fn with_renewability(mut self, renewability: Renewability) -> Self {
        self.renewability = renewability;
        self
    }

    /// Sum of all current allocations
    pub fn allocated_total(&self) -> f64 {
        self.allocations.values().sum()
    }

    /// Allocated to needs other than `need`
    pub fn allocated_excluding(&self, need: &NeedId) -> f64 {
        self.allocations
            .iter()
            .filter(|(id, _)| *id != need)
            .map(|(_, q)| q)
            .sum()
    }

    /// Capacity not yet allocated
    pub fn remaining(&self) -> f64 {
        (self.total_available - self.allocated_total()).max(0.0)
    }

    /// Share of capacity allocated; 0 for an empty resource
    pub fn utilization(&self) -> f64 {
        if self.total_available <= 0.0 {
            return 0.0;
        }
        self.allocated_total() / self.total_available
    }

    pub fn is_sustainable(&self) -> bool {
        self.utilization() <= self.sustainability_threshold
    }

    pub fn is_critical(&self) -> bool {
        self.utilization() >= self.critical_threshold
    }

    pub fn with_depletion(mut self, rate: f64) -> Self {
        self.depletion_rate = rate;
        self
    }

    /// Wear capacity down in proportion to how much of it is in use
    ///
    /// Never drops below what is already allocated.
    pub fn deplete(&mut self) {
        let loss = self.total_available * self.depletion_rate * self.utilization().min(1.0);
        self.total_available = (self.total_available - loss).max(self.allocated_total());
    }

    /// Grow capacity by the regeneration rate, bounded by the ceiling
    pub fn regenerate(&mut self) {
        let grown = self.total_available * (1.0 + self.regeneration_rate);
        self.total_available = match self.capacity_ceiling {
            Some(ceiling) => grown.min(ceiling.max(self.total_available)),
            None => grown,
        };
    }

    /// Advance the rolling sustainability score from current utilization
    pub fn update_sustainability_score(&mut self) {
        let utilization = self.utilization();
        if utilization > 0.8 {
            self.sustainability_score *= 0.98;
        } else if utilization < 0.6 {
            self.sustainability_score *= 1.01;
        }
        self.sustainability_score = self
            .sustainability_score
            .clamp(MIN_SUSTAINABILITY_SCORE, MAX_SUSTAINABILITY_SCORE);
    }

    /// Drop allocations that have shrunk to nothing
    pub fn prune_allocations(&mut self) {
        self.allocations.retain(|_, q| *q > ALLOCATION_EPSILON);
    }

    /// Check field ranges before the record enters a ledger
    pub fn validate(&self) -> Result<(), LedgerError> {
        let invalid = |reason: &str| Err(LedgerError::invalid(EntityKind::Resource, &self.id, reason));

        if !self.total_available.is_finite() || self.total_available < 0.0 {
            return invalid("total_available must be finite and non-negative");
        }
        if !(0.0..=1.0).contains(&self.sustainability_threshold)
            || !(0.0..=1.0).contains(&self.critical_threshold)
        {
            return invalid("thresholds must lie in [0, 1]");
        }
        if self.sustainability_threshold > self.critical_threshold {
            return invalid("sustainability_threshold exceeds critical_threshold");
        }
        for (name, value) in [
            ("quality", self.quality),
            ("accessibility", self.accessibility),
            ("environmental_impact", self.environmental_impact),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return invalid(&format!("{} must lie in [0, 1]", name));
            }
        }
        if !self.regeneration_rate.is_finite() || self.regeneration_rate < 0.0 {
            return invalid("regeneration_rate must be non-negative");
        }
        if !(0.0..=1.0).contains(&self.depletion_rate) {
            return invalid("depletion_rate must lie in [0, 1]");
        }
        if self.allocations.values().any(|q| !q.is_finite() || *q < 0.0) {
            return invalid("allocations must be finite and non-negative");
        }
        if self.allocated_total() > self.total_available + ALLOCATION_EPSILON {
            return invalid("allocations exceed total_available");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn water(capacity: f64) -> Resource {
        Resource::new("water-1", ResourceCategory::Water, capacity)
    }

    #[test]
    fn test_utilization_predicates() {
        let mut r = water(1000.0);
        r.allocations.insert(NeedId::new("n1"), 800.0);
        assert!((r.utilization() - 0.8).abs() < 1e-12);
        assert!(r.is_sustainable());
        assert!(!r.is_critical());

        r.allocations.insert(NeedId::new("n2"), 150.0);
        assert!(!r.is_sustainable());
        assert!(r.is_critical());
        assert!((r.remaining() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_capacity_utilization() {
        let r = water(0.0);
        assert_eq!(r.utilization(), 0.0);
        assert!(r.is_sustainable());
    }

    #[test]
    fn test_regenerate_respects_ceiling() {
        let mut r = water(100.0).with_regeneration(0.5);
        r.capacity_ceiling = Some(120.0);
        r.regenerate();
        assert_eq!(r.total_available, 120.0);
        r.regenerate();
        assert_eq!(r.total_available, 120.0);
    }

    #[test]
    fn test_depletion_follows_utilization() {
        let mut idle = water(100.0).with_depletion(0.1);
        idle.deplete();
        assert_eq!(idle.total_available, 100.0);

        let mut busy = water(100.0).with_depletion(0.1);
        busy.allocations.insert(NeedId::new("n1"), 50.0);
        busy.deplete();
        assert!((busy.total_available - 95.0).abs() < 1e-9);
    }

    #[test]
    fn test_depletion_keeps_allocations_covered() {
        let mut r = water(100.0).with_depletion(1.0);
        r.allocations.insert(NeedId::new("n1"), 90.0);
        r.deplete();
        assert_eq!(r.total_available, 90.0);
        assert!(r.validate().is_ok());
    }

    #[test]
    fn test_depletion_rate_out_of_range_rejected() {
        assert!(water(100.0).with_depletion(1.5).validate().is_err());
        assert!(water(100.0).with_depletion(-0.1).validate().is_err());
    }

    #[test]
    fn test_sustainability_score_bounds() {
        let mut r = water(100.0);
        r.allocations.insert(NeedId::new("n1"), 95.0);
        for _ in 0..500 {
            r.update_sustainability_score();
        }
        assert!((r.sustainability_score - MIN_SUSTAINABILITY_SCORE).abs() < 1e-12);

        r.allocations.clear();
        for _ in 0..500 {
            r.update_sustainability_score();
        }
        assert!((r.sustainability_score - MAX_SUSTAINABILITY_SCORE).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_bad_thresholds() {
        let r = water(10.0).with_thresholds(0.9, 0.5);
        assert!(matches!(r.validate(), Err(LedgerError::InvalidRecord { .. })));
        assert!(water(10.0).validate().is_ok());
    }

    #[test]
    fn test_deserialize_defaults() {
        let r: Resource = serde_json::from_str(
            r#"{"id": "solar-1", "category": "energy", "total_available": 50.0}"#,
        )
        .unwrap();
        assert_eq!(r.sustainability_threshold, DEFAULT_SUSTAINABILITY_THRESHOLD);
        assert_eq!(r.critical_threshold, DEFAULT_CRITICAL_THRESHOLD);
        assert_eq!(r.renewability, Renewability::Renewable);
        assert!(r.capacity_ceiling.is_none());
    }
}

//! CompatibilityModel - pure (resource, need) scoring
//!
//! ```text
//! score = 0.30·type_match + 0.25·quality_margin + 0.20·distance_decay
//!       + 0.15·accessibility + 0.10·(1 − environmental_impact)
//!
//! cost  = extraction_cost + distance_km·0.01 + environmental_impact·10
//! ```
//!
//! No randomness: identical inputs always give identical scores.

use serde::{Deserialize, Serialize};
use worldgame_common::{Need, Resource};

/// Weights of the compatibility blend
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompatibilityWeights {
    pub type_match: f64,
    pub quality_margin: f64,
    pub distance: f64,
    pub accessibility: f64,
    pub environmental: f64,
}

impl Default for CompatibilityWeights {
    fn default() -> Self {
        Self {
            type_match: 0.3,
            quality_margin: 0.25,
            distance: 0.2,
            accessibility: 0.15,
            environmental: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompatibilityConfig {
    pub weights: CompatibilityWeights,
    /// Distance at which the distance term reaches zero
    pub max_radius_km: f64,
    pub transport_cost_per_km: f64,
    pub environmental_penalty: f64,
    /// Floor for the per-unit cost
    pub min_unit_cost: f64,
}

impl Default for CompatibilityConfig {
    fn default() -> Self {
        Self {
            weights: CompatibilityWeights::default(),
            max_radius_km: 10_000.0,
            transport_cost_per_km: 0.01,
            environmental_penalty: 10.0,
            min_unit_cost: 0.01,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompatibilityModel {
    config: CompatibilityConfig,
}

impl CompatibilityModel {
    pub fn new(config: CompatibilityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompatibilityConfig {
        &self.config
    }

    /// Fitness of `resource` for `need` in [0, 1]
    pub fn score(&self, resource: &Resource, need: &Need) -> f64 {
        let w = &self.config.weights;

        let type_match = if need.requires(resource.category) { 1.0 } else { 0.0 };
        let quality_margin = (resource.quality - need.min_quality_for(resource.category)).max(0.0);
        let distance_decay = self.distance_decay(resource, need);

        let score = w.type_match * type_match
            + w.quality_margin * quality_margin
            + w.distance * distance_decay
            + w.accessibility * resource.accessibility
            + w.environmental * (1.0 - resource.environmental_impact);

        score.clamp(0.0, 1.0)
    }

    /// Linear falloff from 1 at the need's location to 0 at `max_radius_km`
    pub fn distance_decay(&self, resource: &Resource, need: &Need) -> f64 {
        if self.config.max_radius_km <= 0.0 {
            return 0.0;
        }
        let distance = resource.location.distance_km(&need.location);
        (1.0 - distance / self.config.max_radius_km).max(0.0)
    }

    /// Per-unit delivery cost
    pub fn unit_cost(&self, resource: &Resource, need: &Need) -> f64 {
        let distance = resource.location.distance_km(&need.location);
        let cost = resource.extraction_cost
            + distance * self.config.transport_cost_per_km
            + resource.environmental_impact * self.config.environmental_penalty;
        cost.max(self.config.min_unit_cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldgame_common::{Location, ResourceCategory, Urgency};

    fn need() -> Need {
        Need::new("n", Urgency::new(5))
            .with_requirement(ResourceCategory::Water, 10.0)
            .with_min_quality(ResourceCategory::Water, 0.5)
            .with_location(Location::new(0.0, 0.0))
    }

    #[test]
    fn test_perfect_match() {
        let model = CompatibilityModel::default();
        let r = Resource::new("w", ResourceCategory::Water, 1.0);
        let n = Need::new("n", Urgency::new(5)).with_requirement(ResourceCategory::Water, 1.0);
        assert!((model.score(&r, &n) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_score_components() {
        let model = CompatibilityModel::default();
        let r = Resource::new("w", ResourceCategory::Water, 1.0)
            .with_quality(0.9, 0.6)
            .with_impact(0.5, 2.0)
            .with_location(Location::new(0.0, 0.0));
        let expected = 0.3 + 0.25 * 0.4 + 0.2 + 0.15 * 0.6 + 0.1 * 0.5;
        assert!((model.score(&r, &need()) - expected).abs() < 1e-9);

        let wrong_type = Resource::new("e", ResourceCategory::Energy, 1.0);
        assert!(model.score(&wrong_type, &need()) < 0.71);
    }

    #[test]
    fn test_distance_decay_is_linear() {
        let model = CompatibilityModel::default();
        // a quarter of the Earth's circumference along the equator
        let r = Resource::new("w", ResourceCategory::Water, 1.0).with_location(Location::new(0.0, 90.0));
        let d = std::f64::consts::PI * worldgame_common::EARTH_RADIUS_KM / 2.0;
        assert!((model.distance_decay(&r, &need()) - (1.0 - d / 10_000.0)).abs() < 1e-9);

        let far = Resource::new("w", ResourceCategory::Water, 1.0).with_location(Location::new(0.0, 180.0));
        assert_eq!(model.distance_decay(&far, &need()), 0.0);
    }

    #[test]
    fn test_unit_cost() {
        let model = CompatibilityModel::default();
        let r = Resource::new("w", ResourceCategory::Water, 1.0).with_impact(0.2, 1.5);
        assert!((model.unit_cost(&r, &need()) - 3.5).abs() < 1e-9);

        let free = Resource::new("w", ResourceCategory::Water, 1.0);
        assert_eq!(model.unit_cost(&free, &need()), 0.01);
    }

    #[test]
    fn test_deterministic() {
        let model = CompatibilityModel::default();
        let r = Resource::new("w", ResourceCategory::Water, 1.0)
            .with_location(Location::new(12.5, -40.25))
            .with_quality(0.77, 0.31);
        let a = model.score(&r, &need());
        let b = model.score(&r, &need());
        assert_eq!(a.to_bits(), b.to_bits());
    }
}

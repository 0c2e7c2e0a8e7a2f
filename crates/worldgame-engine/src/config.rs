//! Engine configuration
//!
//! Defaults, then an optional TOML file, then `WORLDGAME__`-prefixed
//! environment variables (`WORLDGAME__OPTIMIZER__STRATEGY=priority_greedy`).
//! A `.env` file is read first when present.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;
use worldgame_allocator::{CompatibilityConfig, OptimizerConfig};
use worldgame_common::{Result, WorldGameError};
use worldgame_crisis::CrisisConfig;
use worldgame_governance::GovernanceConfig;
use worldgame_ledger::LedgerConfig;

use crate::ENV_PREFIX;

/// Full engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldGameConfig {
    pub ledger: LedgerConfig,
    pub compatibility: CompatibilityConfig,
    pub optimizer: OptimizerConfig,
    pub governance: GovernanceConfig,
    pub crisis: CrisisConfig,
    pub simulation: SimulationConfig,
}

/// Run settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Days to simulate
    pub days: u32,
    /// Run seed; derived from the clock and logged when absent
    pub seed: Option<u64>,
    /// Scenario JSON with the collaborator records
    pub scenario: Option<PathBuf>,
    /// Where to write the history as JSON lines
    pub history_path: Option<PathBuf>,
    /// Where to write the final ledger snapshot
    pub snapshot_path: Option<PathBuf>,
    /// Routine plans below this confidence go to a vote
    pub governance_confidence: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            days: 365,
            seed: None,
            scenario: None,
            history_path: None,
            snapshot_path: None,
            governance_confidence: 0.5,
        }
    }
}

impl WorldGameConfig {
    /// Load from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => warn!(error = %e, "Ignoring unreadable .env file"),
        }

        let mut builder = config::Config::builder().add_source(defaults()?);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(environment());

        let cfg: Self = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(config_error)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document layered over the defaults
    pub fn from_toml(document: &str) -> Result<Self> {
        let cfg: Self = config::Config::builder()
            .add_source(defaults()?)
            .add_source(config::File::from_str(document, config::FileFormat::Toml))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(config_error)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values that would break engine invariants
    pub fn validate(&self) -> Result<()> {
        let unit = |name: &str, value: f64| -> Result<()> {
            if value.is_finite() && (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(WorldGameError::Config(format!("{} must lie in [0, 1], got {}", name, value)))
            }
        };

        let optimizer = &self.optimizer;
        unit("optimizer.emergency_reserve_fraction", optimizer.emergency_reserve_fraction)?;
        unit("optimizer.critical_correction", optimizer.critical_correction)?;
        unit("optimizer.min_coverage", optimizer.min_coverage)?;
        unit("optimizer.fallback_confidence", optimizer.fallback_confidence)?;
        if !(1..=10).contains(&optimizer.urgent_threshold) {
            return Err(WorldGameError::Config(format!(
                "optimizer.urgent_threshold must lie in 1..=10, got {}",
                optimizer.urgent_threshold
            )));
        }

        let thresholds = &self.governance.thresholds;
        unit("governance.thresholds.local", thresholds.local)?;
        unit("governance.thresholds.bioregional", thresholds.bioregional)?;
        unit("governance.thresholds.continental", thresholds.continental)?;
        unit("governance.thresholds.planetary", thresholds.planetary)?;

        unit("crisis.success_threshold", self.crisis.success_threshold)?;
        unit("crisis.failure_threshold", self.crisis.failure_threshold)?;
        if self.crisis.failure_threshold > self.crisis.success_threshold {
            return Err(WorldGameError::Config(
                "crisis.failure_threshold exceeds crisis.success_threshold".to_string(),
            ));
        }
        if self.ledger.regeneration_ceiling_factor < 1.0 {
            return Err(WorldGameError::Config(format!(
                "ledger.regeneration_ceiling_factor must be at least 1, got {}",
                self.ledger.regeneration_ceiling_factor
            )));
        }
        // the config layer stores integers as i64
        if let Some(seed) = self.simulation.seed {
            if seed > i64::MAX as u64 {
                return Err(WorldGameError::Config(format!(
                    "simulation.seed must be at most {}, got {}",
                    i64::MAX,
                    seed
                )));
            }
        }
        unit("simulation.governance_confidence", self.simulation.governance_confidence)
    }
}

fn defaults() -> Result<config::Config> {
    config::Config::try_from(&WorldGameConfig::default()).map_err(config_error)
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

fn config_error(err: config::ConfigError) -> WorldGameError {
    WorldGameError::Config(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldgame_common::StrategyKind;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = WorldGameConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.optimizer.strategy, StrategyKind::Relaxation);
        assert_eq!(cfg.governance.voting_days, 7);
        assert_eq!(cfg.simulation.days, 365);
    }

    #[test]
    fn test_toml_overrides_nested_fields() {
        let cfg = WorldGameConfig::from_toml(
            r#"
            [optimizer]
            strategy = "priority_greedy"
            emergency_reserve_fraction = 0.3

            [governance.thresholds]
            planetary = 0.8

            [simulation]
            days = 90
            seed = 42
            "#,
        )
        .unwrap();

        assert_eq!(cfg.optimizer.strategy, StrategyKind::PriorityGreedy);
        assert_eq!(cfg.optimizer.emergency_reserve_fraction, 0.3);
        assert_eq!(cfg.optimizer.urgent_threshold, 7);
        assert_eq!(cfg.governance.thresholds.planetary, 0.8);
        assert_eq!(cfg.governance.thresholds.local, 0.5);
        assert_eq!(cfg.simulation.days, 90);
        assert_eq!(cfg.simulation.seed, Some(42));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = WorldGameConfig::from_toml("[optimizer]\ncritical_correction = 1.5\n").unwrap_err();
        assert!(matches!(err, WorldGameError::Config(ref msg) if msg.contains("critical_correction")));

        let err = WorldGameConfig::from_toml("[crisis]\nfailure_threshold = 0.9\n").unwrap_err();
        assert!(matches!(err, WorldGameError::Config(_)));
    }

    #[test]
    fn test_seed_beyond_i64_rejected() {
        let mut cfg = WorldGameConfig::default();
        cfg.simulation.seed = Some(u64::MAX);
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, WorldGameError::Config(ref msg) if msg.contains("simulation.seed")));

        cfg.simulation.seed = Some(i64::MAX as u64);
        assert!(cfg.validate().is_ok());
        assert!(config::Config::try_from(&cfg).is_ok());
    }
}

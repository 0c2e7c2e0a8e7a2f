//! # World Game Engine
//!
//! Wires the ledger, optimizer, governance and crisis coordinator into a
//! day-by-day simulation driven by a scenario file.
//!
//! ## Daily Cycle
//!
//! 1. Advance the shared clock and detect scheduled challenges
//! 2. Draft crisis responses and open expedited votes
//! 3. Plan routine allocations; commit directly, or put contested plans to a vote
//! 4. Finalize proposals past deadline and evaluate crisis responses
//! 5. Count challenges down, retire finished needs, regenerate resources

pub mod config;
pub mod scenario;
pub mod simulation;
pub mod telemetry;
pub mod voting;

pub use config::{SimulationConfig, WorldGameConfig};
pub use scenario::Scenario;
pub use simulation::{DayReport, RunSummary, Simulation};
pub use telemetry::EngineMetrics;
pub use voting::{SeededVoting, VotingBehavior};

/// Engine version
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "WORLDGAME";

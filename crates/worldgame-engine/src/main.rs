//! World Game Simulation Binary
//!
//! Usage: `worldgame [config.toml]`. The scenario path comes from
//! `simulation.scenario` or `WORLDGAME__SIMULATION__SCENARIO`.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use prometheus::{Encoder, TextEncoder};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use worldgame_engine::{Scenario, Simulation, WorldGameConfig, ENGINE_VERSION};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("Starting World Game engine v{}", ENGINE_VERSION);

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = WorldGameConfig::load(config_path.as_deref()).context("loading configuration")?;
    info!("Loaded configuration: {:?}", config);

    let Some(scenario_path) = config.simulation.scenario.clone() else {
        bail!("no scenario configured; set simulation.scenario or WORLDGAME__SIMULATION__SCENARIO");
    };
    let scenario = Scenario::from_path(&scenario_path)
        .with_context(|| format!("reading scenario {}", scenario_path.display()))?;

    let history_path = config.simulation.history_path.clone();
    let snapshot_path = config.simulation.snapshot_path.clone();

    let mut simulation = Simulation::new(config, scenario)?;
    info!(seed = simulation.seed(), "Run seed");
    let summary = simulation.run().await?;

    if let Some(path) = history_path {
        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        simulation.ledger().history().write_json_lines(BufWriter::new(file))?;
        info!(path = %path.display(), "Wrote history");
    }
    if let Some(path) = snapshot_path {
        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &simulation.ledger().snapshot())?;
        info!(path = %path.display(), "Wrote snapshot");
    }

    let mut metrics = Vec::new();
    TextEncoder::new().encode(&simulation.registry().gather(), &mut metrics)?;
    tracing::debug!("Final metrics:\n{}", String::from_utf8_lossy(&metrics));

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

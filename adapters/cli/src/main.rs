#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that plays a headless Arena Rush run.
//!
//! The run is driven from a fixed host tick: enemies spawn from the pooled
//! arena, live for a random span and die, intermissions are confirmed after a
//! short wait, and the run ends on game over. Best records persist to a JSON
//! file between invocations.

mod config;
mod records;
mod simulation;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use crate::{
    config::{SessionFile, BUNDLED_SESSION},
    records::FileRecordStore,
    simulation::{Outcome, SimulationOptions},
};

/// Headless Arena Rush session runner.
#[derive(Debug, Parser)]
#[command(name = "arena-rush")]
#[command(about = "Plays a headless wave-survival session")]
#[command(version)]
struct Cli {
    /// Session file to load instead of the bundled arena.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// File holding the best wave and survival time.
    #[arg(long, default_value = "arena-rush-records.json")]
    records: PathBuf,
    /// Overrides the simulation seed.
    #[arg(long)]
    seed: Option<u64>,
    /// Kills the player after this many seconds of play.
    #[arg(long)]
    die_at: Option<f64>,
    /// Ends the run after this many seconds of wall time.
    #[arg(long)]
    max_seconds: Option<f64>,
    /// Rejects session files without waves or spawn locations.
    #[arg(long)]
    strict: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut file = match &cli.config {
        Some(path) => SessionFile::load(path)
            .with_context(|| format!("loading session {}", path.display()))?,
        None => SessionFile::parse(BUNDLED_SESSION).context("parsing bundled session")?,
    };
    if cli.strict {
        file.validate_strict().context("validating session")?;
    }

    if let Some(seed) = cli.seed {
        file.simulation.seed = seed;
    }
    if let Some(die_at) = cli.die_at {
        file.simulation.die_at = Some(die_at);
    }
    if let Some(max_seconds) = cli.max_seconds {
        file.simulation.max_seconds = max_seconds;
    }
    let options = SimulationOptions::from_section(&file.simulation)
        .context("invalid simulation settings")?;

    let store = FileRecordStore::new(cli.records);
    info!(records = %store.path().display(), waves = file.waves.len(), "starting session");
    let outcome =
        simulation::run(&file, &options, Box::new(store)).context("running session")?;

    print_summary(&outcome);
    Ok(())
}

fn print_summary(outcome: &Outcome) {
    match &outcome.info {
        Some(info) => {
            println!("game over: {}", info.reason);
            println!(
                "wave {} survived {:.1}s{}{}",
                info.wave,
                info.survived_seconds,
                if info.is_new_best_wave { " [new best wave]" } else { "" },
                if info.is_new_best_time { " [new best time]" } else { "" },
            );
            println!(
                "best: wave {} / {:.1}s",
                info.best_wave, info.best_seconds
            );
        }
        None => println!("run ended without a game over"),
    }
    println!(
        "waves cleared {} | spawned {} | events {} | elapsed {:.1}s",
        outcome.waves_cleared,
        outcome.spawned,
        outcome.events,
        outcome.elapsed.as_secs_f64()
    );
    println!(
        "bodies created {} | destroyed {} | pending releases {}",
        outcome.created, outcome.destroyed, outcome.pending_releases
    );
    println!("{}", outcome.report);
}

//! # lwsim
//!
//! CLI runner for LoRaWAN airtime accounting and duty-cycle compliance
//! simulations.

use std::path::PathBuf;

use clap::Parser;
use lwsim_runner::{build_simulation, RunnerError, Scenario, SummaryReport};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// lwsim - LoRaWAN duty-cycle compliance simulator
#[derive(Parser, Debug)]
#[command(name = "lwsim")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Scenario YAML file. The built-in bridge deployment is used if omitted.
    scenario: Option<PathBuf>,

    /// Override the simulated duration in hours.
    #[arg(long)]
    duration_hours: Option<u64>,

    /// Override the RNG seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Write the summary report as JSON to this path.
    #[arg(long)]
    json_out: Option<PathBuf>,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), RunnerError> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    lwsim_metrics::describe_metrics();

    let cli = Cli::parse();
    let mut scenario = match &cli.scenario {
        Some(path) => Scenario::from_yaml_file(path)?,
        None => Scenario::bridge(),
    };
    if let Some(hours) = cli.duration_hours {
        scenario.duration_hours = hours;
    }
    if let Some(seed) = cli.seed {
        scenario.seed = seed;
    }

    let mut event_loop = build_simulation(&scenario)?;
    let stats = event_loop.run()?;

    let report = SummaryReport::from_run(&event_loop, &stats);
    println!("{}", report.render_text());
    if let Some(path) = &cli.json_out {
        report.write_json(path)?;
        tracing::info!(path = %path.display(), "summary report written");
    }
    Ok(())
}

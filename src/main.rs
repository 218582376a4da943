//! rulefsm - rule-compiled finite state machine simulator
//!
//! Runs a YAML-described simulation of host objects driven by rule-compiled
//! state machines and prints every state entry.

use clap::Parser;
use rulefsm_sim::{Config, Simulation};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rulefsm")]
#[command(about = "Run a rule-compiled finite state machine simulation")]
#[command(version)]
struct Cli {
    /// Simulation config file (YAML)
    #[arg(short, long, env = "RULEFSM_CONFIG")]
    config: Option<PathBuf>,

    /// Override the stop time, in seconds
    #[arg(long)]
    stop: Option<i64>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            return Err(e.into());
        }
    };
    if let Some(stop) = cli.stop {
        config.clock.stop = stop;
    }
    config.validate()?;

    tracing::info!("Starting simulation");
    tracing::info!("  Window: {}s to {}s", config.clock.start, config.clock.stop);
    tracing::info!("  Max step: {}s", config.clock.max_step);
    tracing::info!("  Objects: {}", config.objects.len());

    let mut simulation = Simulation::from_config(&config)?;
    let report = simulation.run()?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for record in &report.transitions {
        println!(
            "{:>10}  {}.{} -> {}",
            record.time.as_secs(),
            record.object,
            record.property,
            record.state
        );
    }
    for machine in &report.machines {
        println!(
            "final  {}.{} = {}",
            machine.object,
            machine.property.as_deref().unwrap_or("-"),
            machine.state.as_deref().unwrap_or("?")
        );
    }

    tracing::info!("Simulation finished after {} steps", report.steps);
    Ok(())
}

#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs a seeded, headless skirmish.

mod scenario;

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use skirmish_core::Event;
use skirmish_simulation::{SimConfig, Simulation};
use skirmish_world::query;
use tracing_subscriber::EnvFilter;

use scenario::{Roster, Summary};

#[derive(Parser, Debug)]
#[command(author, version, about = "Runs a headless Skirmish simulation", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of simulation steps to run.
    #[arg(long, default_value_t = 600)]
    ticks: u32,
    /// Simulated milliseconds per step.
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,
    /// Seed of the scenario layout.
    #[arg(long, default_value_t = 7)]
    seed: u64,
    /// Resource nodes scattered across the map.
    #[arg(long, default_value_t = 6)]
    nodes: usize,
    /// Log filter directive such as `info` or `skirmish_world=debug`.
    #[arg(long)]
    log: Option<String>,
}

/// Entry point for the Skirmish command-line interface.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log.as_deref())?;

    let config = match &cli.config {
        Some(path) => SimConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => SimConfig::default(),
    };
    let mut sim = Simulation::new(config).context("failed to create simulation")?;
    println!("{}", query::welcome_banner(sim.world()));

    let roster = scenario::populate(&mut sim, cli.seed, cli.nodes);
    report_roster(&roster);

    let dt = Duration::from_millis(cli.tick_ms);
    let mut destroyed = 0usize;
    for _ in 0..cli.ticks {
        destroyed += sim
            .tick(dt)
            .iter()
            .filter(|event| matches!(event, Event::EntityDestroyed { .. }))
            .count();
    }
    tracing::info!(ticks = cli.ticks, destroyed, "run finished");

    println!("{}", Summary::collect(&sim, &roster));
    Ok(())
}

fn init_tracing(directive: Option<&str>) -> Result<()> {
    let filter = match directive {
        Some(directive) => EnvFilter::try_new(directive)
            .with_context(|| format!("invalid log filter `{directive}`"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn report_roster(roster: &Roster) {
    println!(
        "home: {} workers, {} defenders, depot {:?}, storehouse site {:?}",
        roster.workers.len(),
        roster.defenders.len(),
        roster.depot,
        roster.site
    );
    println!(
        "raiders: {}; resource nodes: {}",
        roster.raiders.len(),
        roster.nodes.len()
    );
}

//! Arbor fork simulator.
//!
//! Replays a seeded scenario against an in-memory block tree: several
//! producers extend the best block or fork off older retained nodes while
//! signed payments are staged between them. Prints a summary of the final
//! tree and of every accepted and rejected submission.

mod config;
mod sim;

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::{error, info};

use crate::config::SimConfig;
use crate::sim::Simulation;

#[derive(Parser, Debug)]
#[command(
    name = "arbor-sim",
    version,
    about = "Deterministic fork simulation over an in-memory Arbor block tree"
)]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of block submissions
    #[arg(long)]
    blocks: Option<u64>,

    /// Number of producers
    #[arg(long)]
    miners: Option<usize>,

    /// Probability in [0, 1] that a submission forks off a random retained node
    #[arg(long)]
    fork_rate: Option<f64>,

    /// RNG seed
    #[arg(long)]
    seed: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format ("text" or "json")
    #[arg(long)]
    log_format: Option<String>,
}

impl Args {
    /// Apply CLI flags on top of the file and environment layers.
    fn apply(self, mut config: SimConfig) -> SimConfig {
        if let Some(blocks) = self.blocks {
            config.blocks = blocks;
        }
        if let Some(miners) = self.miners {
            config.miners = miners;
        }
        if let Some(fork_rate) = self.fork_rate {
            config.fork_rate = fork_rate;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        config
    }
}

fn main() {
    let args = Args::parse();

    let config = match SimConfig::load(args.config.as_deref()) {
        Ok(base) => args.apply(base),
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(2);
        }
    };

    init_logging(&config.log_level, &config.log_format);

    if let Err(e) = config.validate() {
        error!("invalid configuration: {e:#}");
        process::exit(2);
    }

    info!("Arbor simulator v{}", env!("CARGO_PKG_VERSION"));
    info!(
        blocks = config.blocks,
        miners = config.miners,
        fork_rate = config.fork_rate,
        seed = config.seed,
        cut_off_age = config.chain.cut_off_age,
        "starting simulation"
    );

    let summary = match Simulation::new(config).and_then(Simulation::run) {
        Ok(summary) => summary,
        Err(e) => {
            error!("simulation failed: {e:#}");
            process::exit(1);
        }
    };
    summary.log();
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// `RUST_LOG` takes precedence over `level_str` when set.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}

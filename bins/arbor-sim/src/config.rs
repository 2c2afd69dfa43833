//! Simulation configuration.
//!
//! Layered lowest to highest: built-in defaults, an optional TOML file,
//! `ARBOR_*` environment variables, then CLI flags (applied by `main`).
//! Nested chain parameters use a double underscore, e.g.
//! `ARBOR_CHAIN__CUT_OFF_AGE=20`.

use std::path::Path;

use anyhow::{bail, Context, Result};
use arbor_core::config::ChainConfig;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// Parameters of one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub chain: ChainConfig,
    /// Number of block submissions to attempt.
    pub blocks: u64,
    /// Number of independent producers.
    pub miners: usize,
    /// Probability that a submission forks off a random retained node
    /// instead of extending the best block.
    pub fork_rate: f64,
    /// Seed for every random choice, including producer keys.
    pub seed: u64,
    /// Payments staged before each best-tip block.
    pub payments_per_block: usize,
    pub log_level: String,
    /// "text" or "json".
    pub log_format: String,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            chain: ChainConfig::default(),
            blocks: 200,
            miners: 4,
            fork_rate: 0.2,
            seed: 42,
            payments_per_block: 3,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl SimConfig {
    /// Merge defaults, `path` (if given), and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder
            .add_source(
                Environment::with_prefix("ARBOR")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")
    }

    pub fn validate(&self) -> Result<()> {
        self.chain.validate()?;
        if self.miners == 0 {
            bail!("miners must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.fork_rate) {
            bail!("fork_rate must be within [0, 1], got {}", self.fork_rate);
        }
        Ok(())
    }
}

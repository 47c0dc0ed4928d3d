//! Configuration for the `wisp-sweeper` daemon.

use std::{path::PathBuf, time::Duration};

use anyhow::Context as _;
use serde::Deserialize;
use wisp_engine::{
  SweepConfig,
  sweep::{DEFAULT_BATCH_SIZE, DEFAULT_SWEEP_INTERVAL},
};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Daemon configuration, deserialised from `config.toml` and `WISP_*`
/// environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct SweeperConfig {
  pub store_path:    PathBuf,
  #[serde(default = "default_interval_secs")]
  pub interval_secs: u64,
  #[serde(default = "default_batch_size")]
  pub batch_size:    usize,
}

fn default_interval_secs() -> u64 { DEFAULT_SWEEP_INTERVAL.as_secs() }

fn default_batch_size() -> usize { DEFAULT_BATCH_SIZE }

impl SweeperConfig {
  /// Layer `WISP_`-prefixed environment variables over the file at `path`,
  /// which may be absent.
  pub fn load(path: PathBuf) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("WISP"))
      .build()
      .context("failed to read config file")?;

    Self::from_settings(settings)
  }

  fn from_settings(settings: config::Config) -> anyhow::Result<Self> {
    let cfg: Self = settings
      .try_deserialize()
      .context("failed to deserialise SweeperConfig")?;
    anyhow::ensure!(cfg.interval_secs > 0, "interval_secs must be positive");
    anyhow::ensure!(cfg.batch_size > 0, "batch_size must be positive");
    Ok(cfg)
  }

  pub fn sweep(&self) -> SweepConfig {
    SweepConfig {
      interval:   Duration::from_secs(self.interval_secs),
      batch_size: self.batch_size,
    }
  }
}

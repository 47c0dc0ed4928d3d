//! wisp-sweeper daemon.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite item store, and reclaims expired and consumed items on a fixed
//! interval until interrupted.
//!
//! ```
//! cargo run -p wisp-sweeper -- --config /etc/wisp/sweeper.toml
//! cargo run -p wisp-sweeper -- --once
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use tokio::sync::broadcast;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use wisp_engine::{Engine, Sweeper};
use wisp_store_sqlite::SqliteStore;
use wisp_sweeper::SweeperConfig;

#[derive(Parser)]
#[command(author, version, about = "Wisp expired-content sweeper")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Run a single sweep cycle and exit.
  #[arg(long)]
  once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = SweeperConfig::load(cli.config)?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&cfg.store_path);

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let engine = Engine::with_system_clock(Arc::new(store));
  let sweeper = Sweeper::new(engine, cfg.sweep());

  if cli.once {
    let report = sweeper.run_cycle().await;
    tracing::info!(
      candidates = report.candidates,
      reclaimed = report.reclaimed,
      skipped = report.skipped,
      failed = report.failed,
      "single sweep finished"
    );
    return Ok(());
  }

  let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
  let handle = sweeper.spawn(shutdown_rx);

  tokio::signal::ctrl_c()
    .await
    .context("failed to listen for ctrl-c")?;
  tracing::info!("interrupt received");
  let _ = shutdown_tx.send(());
  handle.await.context("sweeper task panicked")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

//! Background reclamation of expired and consumed items.
//!
//! Each cycle:
//! - asks the gateway for candidate ids (a bounded batch)
//! - re-validates every candidate inside an atomic update, moving the ones
//!   that still qualify to `Expired`
//! - batch-deletes the validated ids
//!
//! Every failure is logged and left for the next cycle. An item that was
//! marked `Expired` but not deleted stays a candidate, so nothing is lost
//! by an interrupted or failed cycle.

use std::time::Duration;

use tokio::{sync::broadcast, task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use wisp_core::{
  clock::Clock,
  gateway::{DeleteStatus, PersistenceGateway},
};

use crate::{Engine, Error, events::ItemEvent};

/// Default time between sweep cycles.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Default maximum number of candidates examined per cycle.
pub const DEFAULT_BATCH_SIZE: usize = 500;

#[derive(Debug, Clone)]
pub struct SweepConfig {
  pub interval:   Duration,
  pub batch_size: usize,
}

impl Default for SweepConfig {
  fn default() -> Self {
    Self { interval: DEFAULT_SWEEP_INTERVAL, batch_size: DEFAULT_BATCH_SIZE }
  }
}

/// What one cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
  /// Ids returned by the candidate query.
  pub candidates: usize,
  /// Items deleted this cycle.
  pub reclaimed:  usize,
  /// Candidates that no longer qualified, were already gone, or lost a
  /// write race.
  pub skipped:    usize,
  /// Candidates (or whole queries) that hit a gateway fault.
  pub failed:     usize,
}

pub struct Sweeper<G, C> {
  engine: Engine<G, C>,
  config: SweepConfig,
}

impl<G, C> Sweeper<G, C>
where
  G: PersistenceGateway + 'static,
  C: Clock + Clone,
{
  pub fn new(engine: Engine<G, C>, config: SweepConfig) -> Self {
    Self { engine, config }
  }

  /// Spawn the sweep loop as a background task. It stops when `shutdown`
  /// receives a message or its sender is dropped.
  pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
    tokio::spawn(self.run(shutdown))
  }

  /// Run cycles on a fixed interval until shutdown. The first cycle runs
  /// immediately.
  pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
    info!(
      interval_secs = self.config.interval.as_secs(),
      batch_size = self.config.batch_size,
      "sweeper started"
    );

    let mut interval = tokio::time::interval(self.config.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
      tokio::select! {
        _ = shutdown.recv() => {
          info!("sweeper shutting down");
          break;
        }
        _ = interval.tick() => {
          self.run_cycle().await;
        }
      }
    }
  }

  /// Run a single cycle. Never fails; faults are counted in the report.
  pub async fn run_cycle(&self) -> SweepReport {
    let mut report = SweepReport::default();
    let now = self.engine.clock().now();

    let ids = match self
      .engine
      .gateway()
      .query_expired_candidates(now, self.config.batch_size)
      .await
    {
      Ok(ids) => ids,
      Err(e) => {
        warn!(error = %e, "candidate query failed, deferring to next cycle");
        report.failed += 1;
        return report;
      }
    };
    report.candidates = ids.len();

    let mut doomed: Vec<Uuid> = Vec::with_capacity(ids.len());
    for id in ids {
      match self.engine.expire_if_reclaimable(id).await {
        Ok(Some(reason)) => {
          debug!(item_id = %id, ?reason, "candidate confirmed");
          doomed.push(id);
        }
        Ok(None) => {
          debug!(item_id = %id, "stale candidate, keeping");
          report.skipped += 1;
        }
        Err(Error::NotFound(_)) | Err(Error::WriteConflict(_)) => {
          report.skipped += 1;
        }
        Err(e) => {
          warn!(item_id = %id, error = %e, "could not validate candidate");
          report.failed += 1;
        }
      }
    }

    if doomed.is_empty() {
      return report;
    }

    let attempted = doomed.len();
    match self.engine.gateway().batch_delete(doomed).await {
      Ok(statuses) => {
        for (id, status) in statuses {
          match status {
            DeleteStatus::Deleted => {
              report.reclaimed += 1;
              self.engine.publish(ItemEvent::Deleted { item_id: id });
            }
            DeleteStatus::Missing => report.skipped += 1,
            DeleteStatus::Failed(reason) => {
              warn!(item_id = %id, %reason, "delete failed, will retry");
              report.failed += 1;
            }
          }
        }
      }
      Err(e) => {
        warn!(error = %e, count = attempted, "batch delete failed, will retry");
        report.failed += attempted;
      }
    }

    if report.reclaimed > 0 || report.failed > 0 {
      info!(
        reclaimed = report.reclaimed,
        skipped = report.skipped,
        failed = report.failed,
        "sweep cycle complete"
      );
    }
    report
  }
}

//! Gateway faults: conflicts surface to callers, sweep failures are deferred.

use std::{
  sync::{
    Arc,
    atomic::{AtomicBool, AtomicU32, Ordering},
  },
  time::Duration,
};

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use thiserror::Error;
use uuid::Uuid;
use wisp_core::{
  clock::ManualClock,
  gateway::{DeleteStatus, GatewayFault, PersistenceGateway, Update},
  item::{ContentItem, Identity, NewItem, Policy},
};
use wisp_engine::{
  Engine, Error, MemoryGateway, SweepConfig, Sweeper,
  retry::{ExponentialBackoff, with_backoff},
};

#[derive(Debug, Error)]
#[error("injected fault")]
struct Injected;

impl GatewayFault for Injected {
  fn is_transient(&self) -> bool { true }
}

/// Wraps [`MemoryGateway`], reporting conflicts and failures on demand.
#[derive(Default)]
struct FlakyGateway {
  inner:        MemoryGateway,
  conflicts:    AtomicU32,
  fail_query:   AtomicBool,
  fail_deletes: AtomicBool,
}

impl PersistenceGateway for FlakyGateway {
  type Error = Injected;

  async fn put(&self, item: ContentItem) -> Result<Uuid, Injected> {
    self.inner.put(item).await.map_err(|_| Injected)
  }

  async fn get(&self, id: Uuid) -> Result<Option<ContentItem>, Injected> {
    self.inner.get(id).await.map_err(|_| Injected)
  }

  async fn atomic_update<F, T>(&self, id: Uuid, mutation: F) -> Result<Update<T>, Injected>
  where
    F: FnOnce(ContentItem) -> (ContentItem, T) + Send,
    T: Send,
  {
    let pending = self.conflicts.load(Ordering::SeqCst);
    if pending > 0 {
      self.conflicts.store(pending - 1, Ordering::SeqCst);
      return Ok(Update::Conflict);
    }
    self.inner.atomic_update(id, mutation).await.map_err(|_| Injected)
  }

  async fn query_expired_candidates(
    &self,
    now: DateTime<Utc>,
    limit: usize,
  ) -> Result<Vec<Uuid>, Injected> {
    if self.fail_query.load(Ordering::SeqCst) {
      return Err(Injected);
    }
    self.inner.query_expired_candidates(now, limit).await.map_err(|_| Injected)
  }

  async fn batch_delete(&self, ids: Vec<Uuid>) -> Result<Vec<(Uuid, DeleteStatus)>, Injected> {
    if self.fail_deletes.load(Ordering::SeqCst) {
      return Ok(
        ids
          .into_iter()
          .map(|id| (id, DeleteStatus::Failed("disk on fire".into())))
          .collect(),
      );
    }
    self.inner.batch_delete(ids).await.map_err(|_| Injected)
  }
}

fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() }

fn setup() -> (Engine<FlakyGateway, ManualClock>, ManualClock) {
  let clock = ManualClock::new(t0());
  (Engine::new(Arc::new(FlakyGateway::default()), clock.clone()), clock)
}

async fn viewed_message(engine: &Engine<FlakyGateway, ManualClock>) -> ContentItem {
  let item = engine
    .create(
      NewItem::new("alice", Policy::ephemeral(Duration::from_secs(5), 1))
        .with_recipients(["bob"]),
    )
    .await
    .unwrap();
  engine.mark_viewed(item.item_id, &Identity::from("bob")).await.unwrap().item
}

#[tokio::test]
async fn conflict_is_returned_not_retried() {
  let (engine, _) = setup();
  let item = engine
    .create(
      NewItem::new("alice", Policy::ephemeral(Duration::from_secs(5), 1))
        .with_recipients(["bob"]),
    )
    .await
    .unwrap();

  engine.gateway().conflicts.store(1, Ordering::SeqCst);
  let result = engine.mark_viewed(item.item_id, &Identity::from("bob")).await;
  assert!(matches!(result, Err(Error::WriteConflict(_))));

  // Nothing was applied.
  let current = engine.get(item.item_id).await.unwrap();
  assert_eq!(current.view_count, 0);
  assert!(current.viewed_by.is_empty());
}

#[tokio::test(start_paused = true)]
async fn caller_retry_rides_out_conflicts() {
  let (engine, _) = setup();
  let item = engine
    .create(
      NewItem::new("alice", Policy::ephemeral(Duration::from_secs(5), 1))
        .with_recipients(["bob"]),
    )
    .await
    .unwrap();
  engine.gateway().conflicts.store(3, Ordering::SeqCst);

  let bob = Identity::from("bob");
  let backoff = ExponentialBackoff::default().with_max_attempts(5);
  let outcome = with_backoff(&backoff, || engine.mark_viewed(item.item_id, &bob))
    .await
    .unwrap();

  assert!(outcome.accepted());
  assert_eq!(outcome.item.view_count, 1);
}

#[tokio::test]
async fn failed_query_is_deferred() {
  let (engine, clock) = setup();
  let item = viewed_message(&engine).await;
  clock.advance(TimeDelta::seconds(10));

  let sweeper = Sweeper::new(engine.clone(), SweepConfig::default());
  engine.gateway().fail_query.store(true, Ordering::SeqCst);
  let report = sweeper.run_cycle().await;
  assert_eq!(report.failed, 1);
  assert!(engine.gateway().inner.contains(item.item_id));

  engine.gateway().fail_query.store(false, Ordering::SeqCst);
  assert_eq!(sweeper.run_cycle().await.reclaimed, 1);
}

#[tokio::test]
async fn failed_delete_is_retried_next_cycle() {
  let (engine, clock) = setup();
  let item = viewed_message(&engine).await;
  clock.advance(TimeDelta::seconds(10));

  let sweeper = Sweeper::new(engine.clone(), SweepConfig::default());
  engine.gateway().fail_deletes.store(true, Ordering::SeqCst);
  let report = sweeper.run_cycle().await;
  assert_eq!(report.failed, 1);
  assert_eq!(report.reclaimed, 0);

  // Marked expired, so it is no longer viewable even though it survived.
  assert!(engine.has_expired(item.item_id).await.unwrap());

  engine.gateway().fail_deletes.store(false, Ordering::SeqCst);
  let report = sweeper.run_cycle().await;
  assert_eq!(report.reclaimed, 1);
  assert!(!engine.gateway().inner.contains(item.item_id));
}

#[tokio::test]
async fn conflicting_candidate_is_skipped_not_deleted() {
  let (engine, clock) = setup();
  let item = viewed_message(&engine).await;
  clock.advance(TimeDelta::seconds(10));

  engine.gateway().conflicts.store(1, Ordering::SeqCst);
  let sweeper = Sweeper::new(engine.clone(), SweepConfig::default());
  let report = sweeper.run_cycle().await;
  assert_eq!(report.skipped, 1);
  assert!(engine.gateway().inner.contains(item.item_id));

  assert_eq!(sweeper.run_cycle().await.reclaimed, 1);
}

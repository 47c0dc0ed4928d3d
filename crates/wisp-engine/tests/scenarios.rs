//! End-to-end lifecycle scenarios against the in-memory gateway.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use wisp_core::{
  clock::ManualClock,
  item::{Identity, ItemState, NewItem, Policy},
  lifecycle::ViewDecision,
  visibility::RejectReason,
};
use wisp_engine::{Engine, Error, MemoryGateway, SweepConfig, Sweeper};

type TestEngine = Engine<MemoryGateway, ManualClock>;

fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() }

fn secs(n: i64) -> TimeDelta { TimeDelta::seconds(n) }

fn id(name: &str) -> Identity { Identity::from(name) }

fn setup() -> (TestEngine, ManualClock, Sweeper<MemoryGateway, ManualClock>) {
  let clock = ManualClock::new(t0());
  let engine = Engine::new(Arc::new(MemoryGateway::new()), clock.clone());
  let sweeper = Sweeper::new(engine.clone(), SweepConfig::default());
  (engine, clock, sweeper)
}

// ─── Scenarios ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn single_recipient_message_expires_after_view() {
  let (engine, clock, sweeper) = setup();
  let item = engine
    .create(
      NewItem::new("alice", Policy::ephemeral(Duration::from_secs(5), 1))
        .with_recipients(["bob"]),
    )
    .await
    .unwrap();

  clock.set(t0() + secs(1));
  let first = engine.mark_viewed(item.item_id, &id("bob")).await.unwrap();
  assert!(first.accepted());
  assert_eq!(first.item.expires_at, Some(t0() + secs(6)));
  assert_eq!(first.item.state, ItemState::Viewed);

  clock.set(t0() + secs(2));
  let again = engine.mark_viewed(item.item_id, &id("bob")).await.unwrap();
  assert_eq!(again.decision, ViewDecision::Rejected(RejectReason::LimitReached));
  assert_eq!(again.item, first.item);

  clock.set(t0() + secs(7));
  let report = sweeper.run_cycle().await;
  assert_eq!(report.reclaimed, 1);
  assert!(matches!(engine.get(item.item_id).await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn story_admits_repeat_views_and_dies_after_a_day() {
  let (engine, clock, sweeper) = setup();
  let item = engine
    .create(NewItem::new("alice", Policy::story(Duration::from_secs(5))))
    .await
    .unwrap();

  clock.set(t0() + TimeDelta::hours(1));
  for viewer in ["carol", "dave", "carol"] {
    let outcome = engine.mark_viewed(item.item_id, &id(viewer)).await.unwrap();
    assert!(outcome.accepted(), "{viewer} should be admitted");
  }
  let current = engine.get(item.item_id).await.unwrap();
  assert_eq!(current.view_count, 3);
  assert_eq!(current.expires_at, None);

  clock.set(t0() + TimeDelta::hours(23));
  assert_eq!(sweeper.run_cycle().await.reclaimed, 0);

  clock.set(t0() + TimeDelta::hours(25));
  assert!(engine.has_expired(item.item_id).await.unwrap());
  assert_eq!(sweeper.run_cycle().await.reclaimed, 1);
  assert!(engine.gateway().is_empty());
}

#[tokio::test]
async fn fully_consumed_message_is_reclaimed_before_its_deadline() {
  let (engine, clock, sweeper) = setup();
  let item = engine
    .create(
      NewItem::new("alice", Policy::ephemeral(Duration::from_secs(3600), 2))
        .with_recipients(["erin", "frank"]),
    )
    .await
    .unwrap();

  engine.mark_viewed(item.item_id, &id("erin")).await.unwrap();
  assert_eq!(sweeper.run_cycle().await.reclaimed, 0);

  clock.advance(secs(1));
  let outcome = engine.mark_viewed(item.item_id, &id("frank")).await.unwrap();
  assert!(outcome.accepted());
  assert_eq!(outcome.item.view_count, 2);

  clock.advance(secs(1));
  assert!(!engine.has_expired(item.item_id).await.unwrap());
  assert_eq!(sweeper.run_cycle().await.reclaimed, 1);
  assert!(!engine.gateway().contains(item.item_id));
}

// ─── Properties ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn viewing_window_is_half_open() {
  let (engine, clock, _) = setup();
  let item = engine
    .create(
      NewItem::new("alice", Policy::ephemeral(Duration::from_secs(10), 3))
        .with_recipients(["bob", "carol", "dave"]),
    )
    .await
    .unwrap();

  engine.mark_viewed(item.item_id, &id("bob")).await.unwrap();

  clock.set(t0() + secs(9));
  assert!(engine.can_view(item.item_id, &id("carol")).await.unwrap());

  clock.set(t0() + secs(10));
  assert!(!engine.can_view(item.item_id, &id("carol")).await.unwrap());
  assert_eq!(
    engine.check_view(item.item_id, &id("dave")).await.unwrap(),
    Some(RejectReason::Expired)
  );
}

#[tokio::test]
async fn same_viewer_cannot_view_twice() {
  let (engine, clock, _) = setup();
  let item = engine
    .create(
      NewItem::new("alice", Policy::ephemeral(Duration::from_secs(60), 5))
        .with_recipients(["bob", "carol"]),
    )
    .await
    .unwrap();

  assert!(engine.mark_viewed(item.item_id, &id("bob")).await.unwrap().accepted());
  clock.advance(secs(1));

  let again = engine.mark_viewed(item.item_id, &id("bob")).await.unwrap();
  assert_eq!(again.decision, ViewDecision::Rejected(RejectReason::AlreadyViewed));
  assert_eq!(again.item.view_count, 1);
}

#[tokio::test]
async fn delivery_is_idempotent() {
  let (engine, _, _) = setup();
  let item = engine
    .create(
      NewItem::new("alice", Policy::ephemeral(Duration::from_secs(5), 1))
        .with_recipients(["bob"]),
    )
    .await
    .unwrap();
  let mut events = engine.subscribe();

  let once = engine.mark_delivered(item.item_id).await.unwrap();
  let twice = engine.mark_delivered(item.item_id).await.unwrap();
  assert_eq!(once.state, ItemState::Delivered);
  assert_eq!(once, twice);

  // Only the first call changed anything.
  assert!(events.recv().await.is_ok());
  assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn expired_story_cannot_be_delivered() {
  let (engine, clock, _) = setup();
  let item = engine
    .create(NewItem::new("alice", Policy::story(Duration::from_secs(5))))
    .await
    .unwrap();
  let mut events = engine.subscribe();

  clock.set(t0() + TimeDelta::hours(25));
  assert!(engine.has_expired(item.item_id).await.unwrap());

  let after = engine.mark_delivered(item.item_id).await.unwrap();
  assert_eq!(after.state, ItemState::Sent);
  assert_eq!(engine.get(item.item_id).await.unwrap(), item);
  assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn unknown_items_are_not_found() {
  let (engine, _, _) = setup();
  let missing = uuid::Uuid::new_v4();
  assert!(matches!(engine.mark_delivered(missing).await, Err(Error::NotFound(_))));
  assert!(matches!(
    engine.mark_viewed(missing, &id("bob")).await,
    Err(Error::NotFound(_))
  ));
}

#[tokio::test]
async fn invalid_policies_are_refused_at_creation() {
  let (engine, _, _) = setup();
  let result = engine
    .create(
      NewItem::new("alice", Policy::story(Duration::from_secs(5)))
        .with_recipients(["bob"]),
    )
    .await;
  assert!(matches!(result, Err(Error::Invalid(_))));
  assert!(engine.gateway().is_empty());
}

#[tokio::test]
async fn unviewed_message_is_never_swept() {
  let (engine, clock, sweeper) = setup();
  let item = engine
    .create(
      NewItem::new("alice", Policy::ephemeral(Duration::from_secs(5), 1))
        .with_recipients(["bob"]),
    )
    .await
    .unwrap();

  clock.advance(TimeDelta::days(400));
  let report = sweeper.run_cycle().await;
  assert_eq!(report.candidates, 0);
  assert!(engine.gateway().contains(item.item_id));
  assert!(engine.time_remaining(item.item_id).await.unwrap().is_none());
}

#[tokio::test]
async fn time_remaining_counts_down() {
  let (engine, clock, _) = setup();
  let item = engine
    .create(NewItem::new("alice", Policy::story(Duration::from_secs(5))))
    .await
    .unwrap();

  clock.advance(TimeDelta::hours(20));
  let (deadline, left) = engine.time_remaining(item.item_id).await.unwrap().unwrap();
  assert_eq!(deadline, t0() + TimeDelta::hours(24));
  assert_eq!(left, TimeDelta::hours(4));
}

#[tokio::test]
async fn concurrent_viewers_never_exceed_the_limit() {
  let (engine, _, _) = setup();
  let viewers: Vec<String> = (0..16).map(|n| format!("viewer-{n}")).collect();
  let item = engine
    .create(
      NewItem::new("alice", Policy::ephemeral(Duration::from_secs(60), 3))
        .with_recipients(viewers.iter().cloned()),
    )
    .await
    .unwrap();

  let mut handles = Vec::new();
  for viewer in viewers {
    let engine = engine.clone();
    let item_id = item.item_id;
    handles.push(tokio::spawn(async move {
      engine.mark_viewed(item_id, &Identity::from(viewer)).await
    }));
  }

  let mut accepted = 0;
  for handle in handles {
    if handle.await.unwrap().unwrap().accepted() {
      accepted += 1;
    }
  }

  assert_eq!(accepted, 3);
  let current = engine.get(item.item_id).await.unwrap();
  assert_eq!(current.view_count, 3);
  assert_eq!(current.viewed_by.len(), 3);
}

//! [`Engine`]: viewer- and producer-facing operations over a gateway.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use wisp_core::{
  clock::{Clock, SystemClock},
  expiry,
  gateway::{PersistenceGateway, Update},
  item::{ContentItem, Identity, NewItem},
  lifecycle::{self, ViewDecision},
  visibility::{self, ReclaimReason, RejectReason},
};

use crate::{
  Error, Result,
  events::{EVENT_CHANNEL_CAPACITY, ItemEvent},
};

/// The result of [`Engine::mark_viewed`]: the item as committed and the
/// decision that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewOutcome {
  pub item:     ContentItem,
  pub decision: ViewDecision,
}

impl ViewOutcome {
  pub fn accepted(&self) -> bool { self.decision.is_accepted() }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Runs lifecycle transitions as single atomic gateway updates and publishes
/// the resulting [`ItemEvent`]s.
///
/// The engine never retries on its own. A [`Error::WriteConflict`] goes back
/// to the caller, who decides whether to try again.
///
/// Cloning is cheap; clones share the gateway and the event channel.
pub struct Engine<G, C = SystemClock> {
  gateway: Arc<G>,
  clock:   C,
  events:  broadcast::Sender<ItemEvent>,
}

impl<G, C: Clone> Clone for Engine<G, C> {
  fn clone(&self) -> Self {
    Self {
      gateway: Arc::clone(&self.gateway),
      clock:   self.clock.clone(),
      events:  self.events.clone(),
    }
  }
}

impl<G: PersistenceGateway> Engine<G, SystemClock> {
  pub fn with_system_clock(gateway: Arc<G>) -> Self { Self::new(gateway, SystemClock) }
}

impl<G, C> Engine<G, C>
where
  G: PersistenceGateway,
  C: Clock,
{
  pub fn new(gateway: Arc<G>, clock: C) -> Self {
    let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    Self { gateway, clock, events }
  }

  pub fn gateway(&self) -> &Arc<G> { &self.gateway }

  pub fn clock(&self) -> &C { &self.clock }

  /// Subscribe to item events published after this call.
  pub fn subscribe(&self) -> broadcast::Receiver<ItemEvent> { self.events.subscribe() }

  pub(crate) fn publish(&self, event: ItemEvent) {
    // No subscribers is fine.
    let _ = self.events.send(event);
  }

  // ── Producer ────────────────────────────────────────────────────────────

  /// Validate and store a new item in state `Sent`.
  pub async fn create(&self, input: NewItem) -> Result<ContentItem> {
    let item = input.into_item(Uuid::new_v4(), self.clock.now())?;
    self
      .gateway
      .put(item.clone())
      .await
      .map_err(Error::gateway)?;

    tracing::debug!(
      item_id = %item.item_id,
      owner = %item.owner_id,
      mode = item.mode().as_str(),
      "created item"
    );
    self.publish(ItemEvent::Created {
      item_id:  item.item_id,
      owner_id: item.owner_id.clone(),
    });
    Ok(item)
  }

  // ── Reads ───────────────────────────────────────────────────────────────

  pub async fn get(&self, id: Uuid) -> Result<ContentItem> {
    self
      .gateway
      .get(id)
      .await
      .map_err(Error::gateway)?
      .ok_or(Error::NotFound(id))
  }

  /// Why `viewer` could not view item `id` right now, or `None` if they
  /// could. Does not record anything.
  pub async fn check_view(
    &self,
    id: Uuid,
    viewer: &Identity,
  ) -> Result<Option<RejectReason>> {
    let item = self.get(id).await?;
    Ok(visibility::check_view(&item, viewer, self.clock.now()))
  }

  pub async fn can_view(&self, id: Uuid, viewer: &Identity) -> Result<bool> {
    Ok(self.check_view(id, viewer).await?.is_none())
  }

  pub async fn has_expired(&self, id: Uuid) -> Result<bool> {
    let item = self.get(id).await?;
    Ok(visibility::has_expired(&item, self.clock.now()))
  }

  /// The item's deadline and the time left until it, for countdown display.
  pub async fn time_remaining(
    &self,
    id: Uuid,
  ) -> Result<Option<(DateTime<Utc>, TimeDelta)>> {
    let item = self.get(id).await?;
    let now = self.clock.now();
    Ok(expiry::deadline(&item).zip(expiry::remaining(&item, now)))
  }

  // ── Transitions ─────────────────────────────────────────────────────────

  /// Record transport-confirmed receipt. Idempotent, and a no-op once the
  /// item has expired.
  pub async fn mark_delivered(&self, id: Uuid) -> Result<ContentItem> {
    let now = self.clock.now();
    let update = self
      .gateway
      .atomic_update(id, |item| {
        let before = item.state;
        let item = lifecycle::mark_delivered(item, now);
        let changed = item.state != before;
        (item, changed)
      })
      .await
      .map_err(Error::gateway)?;

    let (item, changed) = applied(id, update)?;
    if changed {
      tracing::debug!(item_id = %id, "item delivered");
      self.publish(ItemEvent::Delivered { item_id: id });
    }
    Ok(item)
  }

  /// Attempt a view by `viewer`, checking and recording it in one atomic
  /// update so that concurrent viewers can never exceed the view limit.
  pub async fn mark_viewed(&self, id: Uuid, viewer: &Identity) -> Result<ViewOutcome> {
    let now = self.clock.now();
    let update = self
      .gateway
      .atomic_update(id, |item| lifecycle::mark_viewed(item, viewer, now))
      .await
      .map_err(Error::gateway)?;

    let (item, decision) = applied(id, update)?;
    match decision {
      ViewDecision::Accepted => {
        tracing::debug!(
          item_id = %id,
          viewer = %viewer,
          view_count = item.view_count,
          "view accepted"
        );
        self.publish(ItemEvent::Viewed {
          item_id:    id,
          viewer:     viewer.clone(),
          at:         now,
          view_count: item.view_count,
        });
      }
      ViewDecision::Rejected(reason) => {
        tracing::debug!(item_id = %id, viewer = %viewer, ?reason, "view rejected");
      }
    }
    Ok(ViewOutcome { item, decision })
  }

  /// Move item `id` to the terminal `Expired` state if it is reclaimable
  /// right now, re-checking inside the update. Returns the reason, or `None`
  /// if the item must be kept.
  pub async fn expire_if_reclaimable(&self, id: Uuid) -> Result<Option<ReclaimReason>> {
    let now = self.clock.now();
    let update = self
      .gateway
      .atomic_update(id, |item| match visibility::reclaim_reason(&item, now) {
        Some(reason) => {
          let changed = !item.is_terminal();
          (lifecycle::mark_expired(item), Some((reason, changed)))
        }
        None => (item, None),
      })
      .await
      .map_err(Error::gateway)?;

    let (_, verdict) = applied(id, update)?;
    let Some((reason, changed)) = verdict else {
      return Ok(None);
    };
    if changed {
      tracing::debug!(item_id = %id, ?reason, "item expired");
      self.publish(ItemEvent::Expired { item_id: id, reason });
    }
    Ok(Some(reason))
  }
}

fn applied<T>(id: Uuid, update: Update<T>) -> Result<(ContentItem, T)> {
  match update {
    Update::Applied { item, output } => Ok((item, output)),
    Update::Conflict => Err(Error::WriteConflict(id)),
    Update::NotFound => Err(Error::NotFound(id)),
  }
}

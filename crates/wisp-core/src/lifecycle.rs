//! The lifecycle state machine.
//!
//! Each transition takes an item by value and returns the next version. None
//! of them touch storage; the engine runs them inside a gateway transaction
//! so that read-check-write is atomic per item.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  expiry,
  item::{ContentItem, Identity, ItemState, Mode},
  visibility::{self, RejectReason},
};

/// Outcome of a view attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum ViewDecision {
  Accepted,
  Rejected(RejectReason),
}

impl ViewDecision {
  pub fn is_accepted(self) -> bool { matches!(self, Self::Accepted) }
}

/// Record transport-confirmed receipt at `now`. Only moves `Sent` forward;
/// calling it again, on a later state, or once the item has expired returns
/// the item unchanged.
pub fn mark_delivered(mut item: ContentItem, now: DateTime<Utc>) -> ContentItem {
  if item.state == ItemState::Sent && !visibility::has_expired(&item, now) {
    item.state = ItemState::Delivered;
  }
  item
}

/// Apply a view by `viewer` at `now`.
///
/// A refused view leaves the item untouched. An accepted one records the
/// viewer, counts the view, moves the state to `Viewed`, and for ephemeral
/// items fixes the deadline if this is the first view.
pub fn mark_viewed(
  mut item: ContentItem,
  viewer: &Identity,
  now: DateTime<Utc>,
) -> (ContentItem, ViewDecision) {
  if let Some(reason) = visibility::check_view(&item, viewer, now) {
    return (item, ViewDecision::Rejected(reason));
  }

  item.viewed_by.entry(viewer.clone()).or_insert(now);
  item.view_count = item.view_count.saturating_add(1);

  if item.state < ItemState::Viewed {
    item.state = ItemState::Viewed;
  }

  if item.mode() == Mode::Ephemeral && item.expires_at.is_none() {
    item.expires_at = Some(expiry::view_deadline(&item.policy, now));
  }

  (item, ViewDecision::Accepted)
}

/// Terminal transition taken by the sweep before reclaiming an item.
pub fn mark_expired(mut item: ContentItem) -> ContentItem {
  item.state = ItemState::Expired;
  item
}

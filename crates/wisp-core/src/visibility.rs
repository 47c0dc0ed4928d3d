//! Visibility evaluation: pure reads over an item's current state.
//!
//! Nothing in this module mutates; any number of readers may call it
//! concurrently. Authorization of the viewer against the owner's audience is
//! the caller's concern; these checks only apply the item's own policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  expiry,
  item::{ContentItem, Identity, Mode},
};

/// Why a view was refused. Refusals are ordinary outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
  /// Past its deadline, or already reclaimed.
  Expired,
  /// The view limit has been used up.
  LimitReached,
  /// Ephemeral items admit one view per viewer.
  AlreadyViewed,
  /// Neither the owner nor a recipient.
  NotAuthorized,
}

/// Why the sweep may destroy an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReclaimReason {
  TimeExpired,
  Consumed,
}

/// Whether `item` has expired at `now`.
///
/// Stories expire a fixed time after creation. Ephemeral items expire only
/// once a first view has fixed their deadline; an unviewed ephemeral item
/// never expires by time. An item already marked `Expired` stays expired.
pub fn has_expired(item: &ContentItem, now: DateTime<Utc>) -> bool {
  item.is_terminal() || expiry::is_past_deadline(item, now)
}

/// The reason `viewer` may not view `item` at `now`, or `None` if they may.
pub fn check_view(
  item: &ContentItem,
  viewer: &Identity,
  now: DateTime<Utc>,
) -> Option<RejectReason> {
  if has_expired(item, now) {
    return Some(RejectReason::Expired);
  }
  if item.policy.max_views.is_reached(item.view_count) {
    return Some(RejectReason::LimitReached);
  }
  match item.mode() {
    Mode::Story => None,
    Mode::Ephemeral if item.has_viewed(viewer) => Some(RejectReason::AlreadyViewed),
    Mode::Ephemeral if !item.is_addressed_to(viewer) => {
      Some(RejectReason::NotAuthorized)
    }
    Mode::Ephemeral => None,
  }
}

pub fn can_be_viewed_by(
  item: &ContentItem,
  viewer: &Identity,
  now: DateTime<Utc>,
) -> bool {
  check_view(item, viewer, now).is_none()
}

/// Whether every recipient of an ephemeral item has consumed it and the view
/// limit is exhausted.
pub fn is_consumed(item: &ContentItem) -> bool {
  item.mode() == Mode::Ephemeral
    && !item.recipients.is_empty()
    && item.policy.max_views.is_reached(item.view_count)
    && item.pending_recipients().next().is_none()
}

/// Why the sweep may delete `item` at `now`, or `None` if it must be kept.
pub fn reclaim_reason(item: &ContentItem, now: DateTime<Utc>) -> Option<ReclaimReason> {
  if has_expired(item, now) {
    Some(ReclaimReason::TimeExpired)
  } else if is_consumed(item) {
    Some(ReclaimReason::Consumed)
  } else {
    None
  }
}

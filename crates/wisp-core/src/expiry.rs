//! Deadline arithmetic.
//!
//! Nothing here schedules work. Deadlines are derived on read and, for
//! ephemeral items, fixed once when the first view commits. A deadline is
//! exclusive: an item is viewable strictly before it and expired from it on.

use chrono::{DateTime, TimeDelta, Utc};

use crate::item::{ContentItem, Mode, Policy};

/// Shelf life of a story, measured from creation.
pub const STORY_LIFETIME_SECS: i64 = 24 * 60 * 60;

pub fn story_lifetime() -> TimeDelta { TimeDelta::seconds(STORY_LIFETIME_SECS) }

/// 9999-12-31T23:59:59Z, the last second with a four-digit year.
pub const LATEST_DEADLINE_SECS: i64 = 253_402_300_799;

/// The latest instant any deadline may hold. Later instants have no
/// fixed-width RFC 3339 rendering.
pub fn latest_deadline() -> DateTime<Utc> {
  DateTime::from_timestamp(LATEST_DEADLINE_SECS, 999_999_999)
    .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn add_saturating(at: DateTime<Utc>, delta: TimeDelta) -> DateTime<Utc> {
  let latest = latest_deadline();
  at.checked_add_signed(delta).map_or(latest, |d| d.min(latest))
}

/// The deadline an ephemeral item receives when first viewed at
/// `first_view`.
pub fn view_deadline(policy: &Policy, first_view: DateTime<Utc>) -> DateTime<Utc> {
  add_saturating(first_view, policy.view_delta())
}

/// The effective deadline of `item`, or `None` while it is undetermined
/// (an ephemeral item nobody has viewed yet).
pub fn deadline(item: &ContentItem) -> Option<DateTime<Utc>> {
  match item.mode() {
    Mode::Story => Some(add_saturating(item.created_at, story_lifetime())),
    Mode::Ephemeral => item.expires_at,
  }
}

/// Whether the time-based deadline has passed at `now`.
pub fn is_past_deadline(item: &ContentItem, now: DateTime<Utc>) -> bool {
  deadline(item).is_some_and(|d| now >= d)
}

/// Time left before the deadline, clamped at zero. Used by presentation
/// collaborators to render countdowns.
pub fn remaining(item: &ContentItem, now: DateTime<Utc>) -> Option<TimeDelta> {
  deadline(item).map(|d| (d - now).max(TimeDelta::zero()))
}

//! Content items, the unit of shareable self-destructing content.
//!
//! An item is a plain record: identity, audience, policy and lifecycle state.
//! It carries no payload bytes; those belong to whatever collaborator stores
//! the media. All mutation goes through [`crate::lifecycle`].

use std::{collections::BTreeMap, collections::BTreeSet, fmt, str::FromStr, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Identity ────────────────────────────────────────────────────────────────

/// An already-authenticated principal, opaque to the engine.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Identity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for Identity {
  fn from(s: &str) -> Self { Self(s.to_owned()) }
}

impl From<String> for Identity {
  fn from(s: String) -> Self { Self(s) }
}

// ─── Policy ──────────────────────────────────────────────────────────────────

/// How an item is shared and when it goes away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
  /// Addressed to specific recipients; the clock starts at first view.
  Ephemeral,
  /// Broadcast to the owner's audience; lives 24 hours from creation.
  Story,
}

impl Mode {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Ephemeral => "ephemeral",
      Self::Story => "story",
    }
  }
}

impl FromStr for Mode {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "ephemeral" => Ok(Self::Ephemeral),
      "story" => Ok(Self::Story),
      other => Err(Error::UnknownMode(other.to_owned())),
    }
  }
}

/// Upper bound on accepted views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ViewLimit {
  Unlimited,
  AtMost(u32),
}

impl ViewLimit {
  /// True once `count` accepted views leave no room for another.
  pub fn is_reached(self, count: u32) -> bool {
    match self {
      Self::Unlimited => false,
      Self::AtMost(max) => count >= max,
    }
  }

  pub fn as_option(self) -> Option<u32> {
    match self {
      Self::Unlimited => None,
      Self::AtMost(max) => Some(max),
    }
  }

  pub fn from_option(max: Option<u32>) -> Self {
    max.map_or(Self::Unlimited, Self::AtMost)
  }
}

/// Longest accepted viewing window.
pub const MAX_VIEW_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Sharing policy fixed at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
  pub mode:          Mode,
  /// How long an item stays viewable once its viewing window opens.
  pub view_duration: Duration,
  pub max_views:     ViewLimit,
}

impl Policy {
  pub fn ephemeral(view_duration: Duration, max_views: u32) -> Self {
    Self {
      mode: Mode::Ephemeral,
      view_duration,
      max_views: ViewLimit::AtMost(max_views),
    }
  }

  pub fn story(view_duration: Duration) -> Self {
    Self {
      mode: Mode::Story,
      view_duration,
      max_views: ViewLimit::Unlimited,
    }
  }

  pub fn validate(&self) -> Result<()> {
    if self.view_duration.is_zero() {
      return Err(Error::InvalidPolicy("view duration must be non-zero"));
    }
    if self.view_duration > MAX_VIEW_DURATION {
      return Err(Error::InvalidPolicy("view duration must not exceed a year"));
    }
    match (self.mode, self.max_views) {
      (_, ViewLimit::AtMost(0)) => {
        Err(Error::InvalidPolicy("view limit must admit at least one view"))
      }
      (Mode::Story, ViewLimit::AtMost(_)) => {
        Err(Error::InvalidPolicy("story items cannot limit views"))
      }
      _ => Ok(()),
    }
  }

  /// `view_duration` as a signed delta, saturating on overflow.
  pub fn view_delta(&self) -> TimeDelta {
    TimeDelta::from_std(self.view_duration).unwrap_or(TimeDelta::MAX)
  }
}

// ─── State ───────────────────────────────────────────────────────────────────

/// Lifecycle state. Ordered; an item only ever moves forward.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
  Sent,
  Delivered,
  Viewed,
  /// Terminal.
  Expired,
}

impl ItemState {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Sent => "sent",
      Self::Delivered => "delivered",
      Self::Viewed => "viewed",
      Self::Expired => "expired",
    }
  }
}

impl FromStr for ItemState {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "sent" => Ok(Self::Sent),
      "delivered" => Ok(Self::Delivered),
      "viewed" => Ok(Self::Viewed),
      "expired" => Ok(Self::Expired),
      other => Err(Error::UnknownState(other.to_owned())),
    }
  }
}

// ─── ContentItem ─────────────────────────────────────────────────────────────

/// One message or story post together with its policy and viewing record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
  pub item_id:    Uuid,
  pub owner_id:   Identity,
  /// Empty for stories, which go to the owner's whole audience.
  pub recipients: BTreeSet<Identity>,
  pub created_at: DateTime<Utc>,
  pub policy:     Policy,
  pub state:      ItemState,
  /// Viewer → first accepted view.
  pub viewed_by:  BTreeMap<Identity, DateTime<Utc>>,
  /// Accepted views. For ephemeral items this is always `viewed_by.len()`;
  /// stories count every accepted view, repeat viewers included.
  pub view_count: u32,
  /// Ephemeral deadline, fixed on first view. Never set for stories.
  pub expires_at: Option<DateTime<Utc>>,
}

impl ContentItem {
  pub fn mode(&self) -> Mode { self.policy.mode }

  pub fn is_terminal(&self) -> bool { self.state == ItemState::Expired }

  pub fn has_viewed(&self, viewer: &Identity) -> bool {
    self.viewed_by.contains_key(viewer)
  }

  /// Whether `viewer` is addressed by this ephemeral item: a recipient or
  /// the owner.
  pub fn is_addressed_to(&self, viewer: &Identity) -> bool {
    *viewer == self.owner_id || self.recipients.contains(viewer)
  }

  /// Recipients who have not yet viewed the item.
  pub fn pending_recipients(&self) -> impl Iterator<Item = &Identity> {
    self.recipients.iter().filter(|r| !self.viewed_by.contains_key(*r))
  }
}

// ─── NewItem ─────────────────────────────────────────────────────────────────

/// Producer input for a new item. The identifier and creation time are
/// assigned by the engine, never by callers.
#[derive(Debug, Clone)]
pub struct NewItem {
  pub owner_id:   Identity,
  pub recipients: BTreeSet<Identity>,
  pub policy:     Policy,
}

impl NewItem {
  pub fn new(owner_id: impl Into<Identity>, policy: Policy) -> Self {
    Self { owner_id: owner_id.into(), recipients: BTreeSet::new(), policy }
  }

  pub fn with_recipients<I, T>(mut self, recipients: I) -> Self
  where
    I: IntoIterator<Item = T>,
    T: Into<Identity>,
  {
    self.recipients.extend(recipients.into_iter().map(Into::into));
    self
  }

  pub fn validate(&self) -> Result<()> {
    self.policy.validate()?;
    if self.policy.mode == Mode::Story && !self.recipients.is_empty() {
      return Err(Error::StoryWithRecipients);
    }
    Ok(())
  }

  /// Build the initial `Sent` record.
  pub fn into_item(
    self,
    item_id: Uuid,
    created_at: DateTime<Utc>,
  ) -> Result<ContentItem> {
    self.validate()?;
    Ok(ContentItem {
      item_id,
      owner_id: self.owner_id,
      recipients: self.recipients,
      created_at,
      policy: self.policy,
      state: ItemState::Sent,
      viewed_by: BTreeMap::new(),
      view_count: 0,
      expires_at: None,
    })
  }
}

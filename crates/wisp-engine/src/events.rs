//! Change notifications for presentation collaborators.
//!
//! Events are published on a broadcast channel after the corresponding
//! write commits. The engine never reads them back, and a slow or missing
//! subscriber cannot affect any decision.

use chrono::{DateTime, Utc};
use uuid::Uuid;
use wisp_core::{item::Identity, visibility::ReclaimReason};

/// Capacity of the event channel; lagging subscribers lose the oldest events.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemEvent {
  Created {
    item_id:  Uuid,
    owner_id: Identity,
  },
  Delivered {
    item_id: Uuid,
  },
  Viewed {
    item_id:    Uuid,
    viewer:     Identity,
    at:         DateTime<Utc>,
    view_count: u32,
  },
  Expired {
    item_id: Uuid,
    reason:  ReclaimReason,
  },
  Deleted {
    item_id: Uuid,
  },
}

impl ItemEvent {
  pub fn item_id(&self) -> Uuid {
    match self {
      Self::Created { item_id, .. }
      | Self::Delivered { item_id }
      | Self::Viewed { item_id, .. }
      | Self::Expired { item_id, .. }
      | Self::Deleted { item_id } => *item_id,
    }
  }
}

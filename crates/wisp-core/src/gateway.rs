//! The `PersistenceGateway` trait, the engine's only view of storage.
//!
//! Implemented by storage adapters (e.g. `wisp-store-sqlite`). The engine
//! and the sweep depend on this abstraction, not on any concrete backend.
//! How an item is laid out on disk is the adapter's business.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::item::ContentItem;

/// Classification an adapter gives its faults, so callers can decide
/// whether to retry.
pub trait GatewayFault: std::error::Error + Send + Sync + 'static {
  /// True when the same call may succeed if repeated (lock contention,
  /// timeouts). Fatal faults return false.
  fn is_transient(&self) -> bool;
}

/// Result of [`PersistenceGateway::atomic_update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update<T> {
  /// The mutation ran against the current record and its result was
  /// committed.
  Applied { item: ContentItem, output: T },
  /// Another writer changed the record between read and write. Nothing was
  /// committed.
  Conflict,
  NotFound,
}

/// Per-id result of [`PersistenceGateway::batch_delete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteStatus {
  Deleted,
  /// Already gone; deleting twice is not an error.
  Missing,
  Failed(String),
}

impl DeleteStatus {
  /// Whether the record is known to be gone.
  pub fn is_gone(&self) -> bool { !matches!(self, Self::Failed(_)) }
}

/// Durable storage for content items.
///
/// All methods return `Send` futures so the gateway can be shared across a
/// multi-threaded runtime.
pub trait PersistenceGateway: Send + Sync {
  type Error: GatewayFault;

  /// Persist a new item and return its identifier.
  fn put(
    &self,
    item: ContentItem,
  ) -> impl Future<Output = Result<Uuid, Self::Error>> + Send + '_;

  /// Retrieve an item by identifier. Returns `None` if not found.
  fn get(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<ContentItem>, Self::Error>> + Send + '_;

  /// Apply `mutation` to the current record and commit its result
  /// atomically. The mutation sees the latest committed version; if that
  /// version changes before the write lands, nothing is committed and
  /// [`Update::Conflict`] is returned for the caller to retry.
  fn atomic_update<F, T>(
    &self,
    id: Uuid,
    mutation: F,
  ) -> impl Future<Output = Result<Update<T>, Self::Error>> + Send
  where
    F: FnOnce(ContentItem) -> (ContentItem, T) + Send,
    T: Send;

  /// Identifiers of at most `limit` items that may be reclaimable at `now`:
  /// past a time deadline, fully consumed, or already marked expired. The
  /// caller re-validates each one.
  fn query_expired_candidates(
    &self,
    now: DateTime<Utc>,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  /// Delete `ids`, reporting the outcome for each in input order.
  fn batch_delete(
    &self,
    ids: Vec<Uuid>,
  ) -> impl Future<Output = Result<Vec<(Uuid, DeleteStatus)>, Self::Error>> + Send + '_;
}

//! [`MemoryGateway`], an in-process [`PersistenceGateway`].
//!
//! Holds every item in a mutex-guarded map. Updates run under the lock, so
//! they never conflict. Useful for tests and for embedding the engine where
//! durability does not matter.

use std::{
  collections::HashMap,
  sync::{Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use wisp_core::{
  gateway::{DeleteStatus, GatewayFault, PersistenceGateway, Update},
  item::ContentItem,
  visibility,
};

#[derive(Debug, Error)]
pub enum MemoryError {
  #[error("item {0} already exists")]
  Duplicate(Uuid),
}

impl GatewayFault for MemoryError {
  fn is_transient(&self) -> bool { false }
}

#[derive(Debug, Default)]
pub struct MemoryGateway {
  items: Mutex<HashMap<Uuid, ContentItem>>,
}

impl MemoryGateway {
  pub fn new() -> Self { Self::default() }

  fn items(&self) -> MutexGuard<'_, HashMap<Uuid, ContentItem>> {
    self.items.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn len(&self) -> usize { self.items().len() }

  pub fn is_empty(&self) -> bool { self.items().is_empty() }

  pub fn contains(&self, id: Uuid) -> bool { self.items().contains_key(&id) }
}

impl PersistenceGateway for MemoryGateway {
  type Error = MemoryError;

  async fn put(&self, item: ContentItem) -> Result<Uuid, MemoryError> {
    let mut items = self.items();
    let id = item.item_id;
    if items.contains_key(&id) {
      return Err(MemoryError::Duplicate(id));
    }
    items.insert(id, item);
    Ok(id)
  }

  async fn get(&self, id: Uuid) -> Result<Option<ContentItem>, MemoryError> {
    Ok(self.items().get(&id).cloned())
  }

  async fn atomic_update<F, T>(
    &self,
    id: Uuid,
    mutation: F,
  ) -> Result<Update<T>, MemoryError>
  where
    F: FnOnce(ContentItem) -> (ContentItem, T) + Send,
    T: Send,
  {
    let mut items = self.items();
    let Some(current) = items.get(&id).cloned() else {
      return Ok(Update::NotFound);
    };
    let (item, output) = mutation(current);
    items.insert(id, item.clone());
    Ok(Update::Applied { item, output })
  }

  async fn query_expired_candidates(
    &self,
    now: DateTime<Utc>,
    limit: usize,
  ) -> Result<Vec<Uuid>, MemoryError> {
    Ok(
      self
        .items()
        .values()
        .filter(|item| visibility::reclaim_reason(item, now).is_some())
        .map(|item| item.item_id)
        .take(limit)
        .collect(),
    )
  }

  async fn batch_delete(
    &self,
    ids: Vec<Uuid>,
  ) -> Result<Vec<(Uuid, DeleteStatus)>, MemoryError> {
    let mut items = self.items();
    Ok(
      ids
        .into_iter()
        .map(|id| {
          let status = match items.remove(&id) {
            Some(_) => DeleteStatus::Deleted,
            None => DeleteStatus::Missing,
          };
          (id, status)
        })
        .collect(),
    )
  }
}

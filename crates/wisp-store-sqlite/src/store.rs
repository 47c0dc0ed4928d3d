//! [`SqliteStore`], the SQLite implementation of [`PersistenceGateway`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use wisp_core::{
  expiry,
  gateway::{DeleteStatus, PersistenceGateway, Update},
  item::ContentItem,
};

use crate::{
  Error, Result,
  encode::{ITEM_COLUMNS, ItemRow, RawItem, encode_dt, encode_uuid},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A content-item store backed by a single SQLite file.
///
/// Updates are optimistic: the row is read with its `version`, the mutation
/// runs in Rust, and the write only lands if the version is unchanged.
/// Otherwise the caller sees [`Update::Conflict`].
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Read an item together with its row version.
  pub(crate) async fn read_versioned(&self, id: Uuid) -> Result<Option<(ContentItem, i64)>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawItem> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {ITEM_COLUMNS} FROM items WHERE item_id = ?1"),
              rusqlite::params![id_str],
              RawItem::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw
      .map(|raw| {
        let version = raw.version;
        raw.into_item().map(|item| (item, version))
      })
      .transpose()
  }

  /// Overwrite the row for `item` if it is still at `version`. Returns
  /// whether the write landed.
  pub(crate) async fn write_if_version(&self, item: &ContentItem, version: i64) -> Result<bool> {
    let row = ItemRow::encode(item)?;

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE items SET
             owner_id = ?2, recipients = ?3, created_at = ?4, mode = ?5,
             policy = ?6, max_views = ?7, state = ?8, viewed_by = ?9,
             view_count = ?10, expires_at = ?11, pending_recipients = ?12,
             version = version + 1
           WHERE item_id = ?1 AND version = ?13",
          rusqlite::params![
            row.item_id,
            row.owner_id,
            row.recipients,
            row.created_at,
            row.mode,
            row.policy,
            row.max_views,
            row.state,
            row.viewed_by,
            row.view_count,
            row.expires_at,
            row.pending_recipients,
            version,
          ],
        )?)
      })
      .await?;

    Ok(changed == 1)
  }
}

// ─── PersistenceGateway impl ─────────────────────────────────────────────────

impl PersistenceGateway for SqliteStore {
  type Error = Error;

  async fn put(&self, item: ContentItem) -> Result<Uuid> {
    let row = ItemRow::encode(&item)?;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO items (
             item_id, owner_id, recipients, created_at, mode, policy,
             max_views, state, viewed_by, view_count, expires_at,
             pending_recipients
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
          rusqlite::params![
            row.item_id,
            row.owner_id,
            row.recipients,
            row.created_at,
            row.mode,
            row.policy,
            row.max_views,
            row.state,
            row.viewed_by,
            row.view_count,
            row.expires_at,
            row.pending_recipients,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(item.item_id)
  }

  async fn get(&self, id: Uuid) -> Result<Option<ContentItem>> {
    Ok(self.read_versioned(id).await?.map(|(item, _)| item))
  }

  async fn atomic_update<F, T>(&self, id: Uuid, mutation: F) -> Result<Update<T>>
  where
    F: FnOnce(ContentItem) -> (ContentItem, T) + Send,
    T: Send,
  {
    let Some((current, version)) = self.read_versioned(id).await? else {
      return Ok(Update::NotFound);
    };

    let unchanged = current.clone();
    let (item, output) = mutation(current);

    // A no-op mutation was decided against the version just read.
    if item == unchanged {
      return Ok(Update::Applied { item, output });
    }

    if self.write_if_version(&item, version).await? {
      Ok(Update::Applied { item, output })
    } else {
      Ok(Update::Conflict)
    }
  }

  async fn query_expired_candidates(
    &self,
    now: DateTime<Utc>,
    limit: usize,
  ) -> Result<Vec<Uuid>> {
    // Deadlines never pass `latest_deadline`, so clamping drops no candidate.
    let now_str = encode_dt(now.min(expiry::latest_deadline()))?;
    let story_cutoff = now
      .checked_sub_signed(expiry::story_lifetime())
      .map(|cutoff| encode_dt(cutoff.min(expiry::latest_deadline())))
      .transpose()?
      .unwrap_or_default();
    let limit_val = i64::try_from(limit).unwrap_or(i64::MAX);

    let ids: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT item_id FROM items
           WHERE state = 'expired'
              OR (mode = 'ephemeral' AND expires_at IS NOT NULL AND expires_at <= ?1)
              OR (mode = 'story' AND created_at <= ?2)
              OR (mode = 'ephemeral'
                  AND recipients <> '[]'
                  AND pending_recipients = 0
                  AND max_views IS NOT NULL
                  AND view_count >= max_views)
           LIMIT ?3",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![now_str, story_cutoff, limit_val], |row| {
            row.get(0)
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    ids.iter().map(|s| Ok(Uuid::parse_str(s)?)).collect()
  }

  async fn batch_delete(&self, ids: Vec<Uuid>) -> Result<Vec<(Uuid, DeleteStatus)>> {
    let outcomes = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut outcomes = Vec::with_capacity(ids.len());
        {
          let mut stmt = tx.prepare("DELETE FROM items WHERE item_id = ?1")?;
          for id in ids {
            let status = match stmt.execute(rusqlite::params![encode_uuid(id)]) {
              Ok(0) => DeleteStatus::Missing,
              Ok(_) => DeleteStatus::Deleted,
              Err(e) => DeleteStatus::Failed(e.to_string()),
            };
            outcomes.push((id, status));
          }
        }
        tx.commit()?;
        Ok(outcomes)
      })
      .await?;

    Ok(outcomes)
  }
}

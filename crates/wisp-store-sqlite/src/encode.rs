//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (nanosecond
//! precision, `Z` suffix) so that SQL string comparison orders them
//! chronologically. Structured fields (policy, audience, viewing record) are
//! stored as compact JSON. UUIDs are stored as hyphenated lowercase strings.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use uuid::Uuid;
use wisp_core::item::{ContentItem, Identity, Policy};

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

/// Fails for years outside `0..=9999`, whose renderings are not fixed-width
/// and would break chronological ordering.
pub fn encode_dt(dt: DateTime<Utc>) -> Result<String> {
  if !(0..=9999).contains(&dt.year()) {
    return Err(Error::OutOfRange("timestamp"));
  }
  Ok(dt.to_rfc3339_opts(SecondsFormat::Nanos, true))
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list shared by every `SELECT` that builds a [`RawItem`].
pub const ITEM_COLUMNS: &str = "item_id, owner_id, recipients, created_at, policy, \
                                state, viewed_by, view_count, expires_at, version";

/// Raw values read directly from an `items` row.
pub struct RawItem {
  pub item_id:    String,
  pub owner_id:   String,
  pub recipients: String,
  pub created_at: String,
  pub policy:     String,
  pub state:      String,
  pub viewed_by:  String,
  pub view_count: i64,
  pub expires_at: Option<String>,
  pub version:    i64,
}

impl RawItem {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      item_id:    row.get(0)?,
      owner_id:   row.get(1)?,
      recipients: row.get(2)?,
      created_at: row.get(3)?,
      policy:     row.get(4)?,
      state:      row.get(5)?,
      viewed_by:  row.get(6)?,
      view_count: row.get(7)?,
      expires_at: row.get(8)?,
      version:    row.get(9)?,
    })
  }

  pub fn into_item(self) -> Result<ContentItem> {
    let policy: Policy = serde_json::from_str(&self.policy)?;
    let recipients: BTreeSet<Identity> = serde_json::from_str(&self.recipients)?;
    let viewed_by: BTreeMap<Identity, DateTime<Utc>> =
      serde_json::from_str(&self.viewed_by)?;

    Ok(ContentItem {
      item_id: decode_uuid(&self.item_id)?,
      owner_id: Identity::new(self.owner_id),
      recipients,
      created_at: decode_dt(&self.created_at)?,
      policy,
      state: self.state.parse()?,
      viewed_by,
      view_count: u32::try_from(self.view_count)
        .map_err(|_| Error::OutOfRange("view_count"))?,
      expires_at: self.expires_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

/// Column values for writing a [`ContentItem`], including the derived
/// columns the candidate query filters on.
pub struct ItemRow {
  pub item_id:            String,
  pub owner_id:           String,
  pub recipients:         String,
  pub created_at:         String,
  pub mode:               &'static str,
  pub policy:             String,
  pub max_views:          Option<i64>,
  pub state:              &'static str,
  pub viewed_by:          String,
  pub view_count:         i64,
  pub expires_at:         Option<String>,
  pub pending_recipients: i64,
}

impl ItemRow {
  pub fn encode(item: &ContentItem) -> Result<Self> {
    let pending = item.pending_recipients().count();
    Ok(Self {
      item_id:            encode_uuid(item.item_id),
      owner_id:           item.owner_id.as_str().to_owned(),
      recipients:         serde_json::to_string(&item.recipients)?,
      created_at:         encode_dt(item.created_at)?,
      mode:               item.mode().as_str(),
      policy:             serde_json::to_string(&item.policy)?,
      max_views:          item.policy.max_views.as_option().map(i64::from),
      state:              item.state.as_str(),
      viewed_by:          serde_json::to_string(&item.viewed_by)?,
      view_count:         i64::from(item.view_count),
      expires_at:         item.expires_at.map(encode_dt).transpose()?,
      pending_recipients: i64::try_from(pending)
        .map_err(|_| Error::OutOfRange("pending_recipients"))?,
    })
  }
}

//! Error type for `wisp-store-sqlite`.

use rusqlite::ErrorCode;
use thiserror::Error;
use wisp_core::gateway::GatewayFault;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] wisp_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("column out of range: {0}")]
  OutOfRange(&'static str),
}

impl GatewayFault for Error {
  /// Lock contention from another connection clears on its own.
  fn is_transient(&self) -> bool {
    match self {
      Self::Database(tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(
        e,
        _,
      ))) => matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked),
      _ => false,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

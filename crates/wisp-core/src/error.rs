//! Error types for `wisp-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid policy: {0}")]
  InvalidPolicy(&'static str),

  #[error("story items are broadcast and cannot name recipients")]
  StoryWithRecipients,

  #[error("unknown content mode: {0:?}")]
  UnknownMode(String),

  #[error("unknown item state: {0:?}")]
  UnknownState(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

//! Error types for `wisp-engine`.

use thiserror::Error;
use uuid::Uuid;
use wisp_core::gateway::GatewayFault;

/// A technical failure. Refused views are not errors; they come back as
/// [`wisp_core::lifecycle::ViewDecision::Rejected`].
#[derive(Debug, Error)]
pub enum Error {
  #[error("item not found: {0}")]
  NotFound(Uuid),

  /// A concurrent writer won. The caller should retry; see
  /// [`crate::retry::with_backoff`].
  #[error("write conflict on item {0}")]
  WriteConflict(Uuid),

  #[error("invalid item: {0}")]
  Invalid(#[from] wisp_core::Error),

  #[error("gateway error: {source}")]
  Gateway {
    transient: bool,
    #[source]
    source:    Box<dyn std::error::Error + Send + Sync>,
  },
}

impl Error {
  pub fn gateway<E: GatewayFault>(err: E) -> Self {
    Self::Gateway { transient: err.is_transient(), source: Box::new(err) }
  }

  /// Whether repeating the same call might succeed.
  pub fn is_retryable(&self) -> bool {
    match self {
      Self::WriteConflict(_) => true,
      Self::Gateway { transient, .. } => *transient,
      Self::NotFound(_) | Self::Invalid(_) => false,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

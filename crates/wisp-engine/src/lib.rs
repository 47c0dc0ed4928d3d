//! The Wisp lifecycle engine.
//!
//! Ties the pure rules in [`wisp_core`] to a [`PersistenceGateway`]: every
//! transition is one atomic read-check-write, every committed change is
//! published as an [`ItemEvent`], and a background [`Sweeper`] reclaims
//! items once they expire or their whole audience has consumed them.
//!
//! [`PersistenceGateway`]: wisp_core::gateway::PersistenceGateway

mod engine;

pub mod error;
pub mod events;
pub mod memory;
pub mod retry;
pub mod sweep;

pub use engine::{Engine, ViewOutcome};
pub use error::{Error, Result};
pub use events::ItemEvent;
pub use memory::MemoryGateway;
pub use sweep::{SweepConfig, SweepReport, Sweeper};

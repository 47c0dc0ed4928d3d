//! Core types and pure logic for the Wisp ephemeral-content engine.
//!
//! No async runtime or database here: items, policies, the visibility rules,
//! the lifecycle state machine, deadline arithmetic, and the storage trait
//! the engine consumes.

pub mod clock;
pub mod error;
pub mod expiry;
pub mod gateway;
pub mod item;
pub mod lifecycle;
pub mod visibility;

pub use error::{Error, Result};

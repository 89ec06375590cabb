//! Election rules: phase transitions, ballot validation, user permissions and
//! the aggregated read model.
//!
//! Everything here is pure. Callers pass in the current time and persist the
//! result themselves.

pub mod permission;
pub mod phase;
pub mod snapshot;
pub mod vote;

pub use permission::{authorize, Denial, UserAction};
pub use phase::PhaseError;
pub use vote::VoteRejection;

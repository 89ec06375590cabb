//! Records as they are persisted in the data directory.

pub mod archive;
pub mod closer;
pub mod election;
pub mod user;

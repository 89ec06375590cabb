//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - Field names are camelCase.
//! - Password hashes never appear.

pub mod auth;
pub mod election;
pub mod receipt;
pub mod user;

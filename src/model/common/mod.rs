//! Types shared between the stored records and the API.

pub mod election;
pub mod id;
pub mod role;

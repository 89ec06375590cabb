pub mod api;
pub mod common;
pub mod db;
pub mod rules;
pub mod store;

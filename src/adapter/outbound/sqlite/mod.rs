//! SQLite persistence adapters.
//!
//! Experiment storage and bulk result writing using Diesel ORM.

pub mod database;
pub mod store;
pub mod writer;

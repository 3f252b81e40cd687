//! Outbound adapters (driven side).

pub mod source;
pub mod sqlite;

//! Engine-agnostic domain types: experiments, results and tabular chunks.

pub mod error;
pub mod experiment;
pub mod id;
pub mod platform;
pub mod result;
pub mod table;

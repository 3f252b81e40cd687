//! Outbound ports (driven side): interfaces implemented by outbound adapters.
//!
//! These contracts describe the tabular sources the engine reads and the
//! persistence layer it writes experiments and results to.

pub mod source;
pub mod store;

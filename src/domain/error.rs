//! Domain validation errors.
//!
//! Raised when a source, an experiment or a persisted row violates one of the
//! invariants the engine relies on.

use thiserror::Error;

/// Errors that occur when domain invariants are violated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Column identifiers must be unique within a source.
    #[error("duplicate sample '{sample}' in source '{source_name}'")]
    DuplicateSample {
        /// The repeated sample identifier.
        sample: String,
        /// Source that contains the duplicate.
        source_name: String,
    },

    /// Sample alignment works over two or three sources.
    #[error("expected 2 or 3 sources for alignment, got {count}")]
    SourceCount {
        /// Number of sources that was provided.
        count: usize,
    },

    /// Thresholds must be finite and non-negative.
    #[error("invalid threshold {field}: {value}")]
    InvalidThreshold {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// A persisted literal does not name a known variant.
    #[error("unknown {kind} '{value}'")]
    UnknownVariant {
        /// Enum being parsed.
        kind: &'static str,
        /// Literal that failed to parse.
        value: String,
    },

    /// A chunk row does not have one value per column.
    #[error("row '{row}' has {found} values, expected {expected}")]
    RaggedRow {
        row: String,
        found: usize,
        expected: usize,
    },
}

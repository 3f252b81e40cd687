//! Domain identifier types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Experiment identifier - newtype over the database row id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExperimentId(i32);

impl ExperimentId {
    /// Wrap a raw row id.
    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    /// Get the raw row id.
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ExperimentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for ExperimentId {
    fn from(id: i32) -> Self {
        Self::new(id)
    }
}

/// Reference to a tabular source, resolved by a
/// [`SourceCatalog`](crate::port::outbound::source::SourceCatalog).
///
/// For file-backed sources this is the path of the delimited file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef(String);

impl SourceRef {
    /// Create a new `SourceRef`.
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Get the reference as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SourceRef {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SourceRef {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn experiment_id_roundtrips_raw_value() {
        let id = ExperimentId::from(42);
        assert_eq!(id.get(), 42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn source_ref_displays_reference() {
        let source = SourceRef::from("/data/mrna.tsv");
        assert_eq!(source.as_str(), "/data/mrna.tsv");
        assert_eq!(format!("{source}"), "/data/mrna.tsv");
    }
}

//! In-memory tabular chunk exchanged between sources and the preparer.

use std::collections::HashMap;

use super::error::DomainError;

/// One molecule row: identifier plus one value per column.
///
/// `None` marks a missing value.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub id: String,
    pub values: Vec<Option<f64>>,
}

impl TableRow {
    pub fn new(id: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            id: id.into(),
            values,
        }
    }
}

/// A block of rows sharing one column layout.
#[derive(Debug, Clone, PartialEq)]
pub struct TableChunk {
    /// Label of the row index (first header cell).
    pub index_label: String,
    /// Sample identifiers, in column order.
    pub columns: Vec<String>,
    pub rows: Vec<TableRow>,
}

impl TableChunk {
    /// Build a chunk, checking every row has one value per column.
    ///
    /// # Errors
    /// Returns [`DomainError::RaggedRow`] for a row of the wrong width.
    pub fn try_new(
        index_label: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<TableRow>,
    ) -> Result<Self, DomainError> {
        if let Some(row) = rows.iter().find(|r| r.values.len() != columns.len()) {
            return Err(DomainError::RaggedRow {
                row: row.id.clone(),
                found: row.values.len(),
                expected: columns.len(),
            });
        }
        Ok(Self {
            index_label: index_label.into(),
            columns,
            rows,
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Restrict and reorder columns to exactly `samples`.
    ///
    /// Samples this chunk does not have become missing values.
    #[must_use]
    pub fn reindex(&self, samples: &[String]) -> Self {
        let lookup: HashMap<&str, usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();
        let positions: Vec<Option<usize>> = samples
            .iter()
            .map(|s| lookup.get(s.as_str()).copied())
            .collect();

        let rows = self
            .rows
            .iter()
            .map(|row| TableRow {
                id: row.id.clone(),
                values: positions
                    .iter()
                    .map(|pos| pos.and_then(|p| row.values[p]))
                    .collect(),
            })
            .collect();

        Self {
            index_label: self.index_label.clone(),
            columns: samples.to_vec(),
            rows,
        }
    }
}

//! Store-backed source held in memory.
//!
//! Datasets owned by another subsystem arrive here already materialised.
//! They are still served chunk by chunk so callers treat them exactly like
//! file-backed sources.

use super::{ensure_unique_samples, matching_positions};
use crate::domain::table::{TableChunk, TableRow};
use crate::error::{Error, Result};
use crate::port::outbound::source::{ChunkIter, SourceKind, SourceStream};

const DEFAULT_CHUNK_SIZE: usize = 500;

/// In-memory table implementing [`SourceStream`].
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    table: TableChunk,
    chunk_size: usize,
}

impl MemorySource {
    /// Build a source from its columns and rows.
    ///
    /// # Errors
    /// Fails on duplicate sample identifiers or rows of the wrong width.
    pub fn new(
        name: impl Into<String>,
        index_label: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<TableRow>,
    ) -> Result<Self> {
        let name = name.into();
        ensure_unique_samples(&name, &columns)?;
        let table = TableChunk::try_new(index_label, columns, rows)?;
        Ok(Self {
            name,
            table,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Rows per chunk returned by [`SourceStream::chunked_table`].
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    fn restrict(&self, rows: &[TableRow], positions: &[usize]) -> Vec<TableRow> {
        rows.iter()
            .map(|row| TableRow {
                id: row.id.clone(),
                values: positions.iter().map(|&p| row.values[p]).collect(),
            })
            .collect()
    }
}

impl SourceStream for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::StoreBacked
    }

    fn samples(&self) -> Result<Vec<String>> {
        Ok(self.table.columns.clone())
    }

    fn specific_row(&self, id: &str, columns: Option<&[String]>) -> Result<Vec<f64>> {
        let positions = matching_positions(&self.table.columns, columns);
        let values: Vec<f64> = self
            .table
            .rows
            .iter()
            .find(|row| row.id == id)
            .map(|row| positions.iter().filter_map(|&p| row.values[p]).collect())
            .unwrap_or_default();

        if values.is_empty() {
            return Err(Error::RowNotFound {
                row: id.to_string(),
                source_name: self.name.clone(),
            });
        }
        Ok(values)
    }

    fn chunked_table<'a>(&'a self, only_matching: Option<&'a [String]>) -> Result<ChunkIter<'a>> {
        let positions = matching_positions(&self.table.columns, only_matching);
        let columns: Vec<String> = positions
            .iter()
            .map(|&p| self.table.columns[p].clone())
            .collect();

        let chunks = self.table.rows.chunks(self.chunk_size).map(move |rows| {
            Ok(TableChunk {
                index_label: self.table.index_label.clone(),
                columns: columns.clone(),
                rows: self.restrict(rows, &positions),
            })
        });
        Ok(Box::new(chunks))
    }

    fn row_count(&self) -> Result<usize> {
        Ok(self.table.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn source() -> MemorySource {
        MemorySource::new(
            "mirna",
            "mirna",
            cols(&["S1", "S2", "S3"]),
            vec![
                TableRow::new("hsa-mir-21", vec![Some(1.0), Some(2.0), Some(3.0)]),
                TableRow::new("hsa-mir-155", vec![None, Some(5.0), Some(6.0)]),
                TableRow::new("hsa-let-7a", vec![Some(7.0), Some(8.0), Some(9.0)]),
            ],
        )
        .unwrap()
        .with_chunk_size(2)
    }

    #[test]
    fn chunked_table_splits_rows() {
        let source = source();
        let sizes: Vec<usize> = source
            .chunked_table(None)
            .unwrap()
            .map(|c| c.unwrap().len())
            .collect();
        assert_eq!(sizes, vec![2, 1]);
        assert_eq!(source.kind(), SourceKind::StoreBacked);
        assert_eq!(source.row_count().unwrap(), 3);
        assert_eq!(source.column_count().unwrap(), 3);
    }

    #[test]
    fn only_matching_restricts_columns() {
        let source = source();
        let keep = cols(&["S2"]);
        let table = source.full_table(Some(&keep)).unwrap();
        assert_eq!(table.columns, keep);
        assert_eq!(table.rows[1].values, vec![Some(5.0)]);
    }

    #[test]
    fn specific_row_skips_missing_values() {
        let source = source();
        assert_eq!(source.specific_row("hsa-mir-155", None).unwrap(), vec![5.0, 6.0]);
        let only_s1 = cols(&["S1"]);
        assert!(matches!(
            source.specific_row("hsa-mir-155", Some(&only_s1)),
            Err(Error::RowNotFound { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_columns_and_ragged_rows() {
        assert!(MemorySource::new("x", "gene", cols(&["S1", "S1"]), Vec::new()).is_err());
        let ragged = vec![TableRow::new("BRCA1", vec![Some(1.0)])];
        assert!(MemorySource::new("x", "gene", cols(&["S1", "S2"]), ragged).is_err());
    }
}

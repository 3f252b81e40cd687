//! Tabular source capability.
//!
//! Every dataset the engine reads, file-backed or store-backed, is consumed
//! through [`SourceStream`]. Code that processes a whole source must use
//! [`SourceStream::chunked_table`]; the full table is never assumed to fit in
//! memory.

use crate::domain::id::SourceRef;
use crate::domain::platform::CpgPlatform;
use crate::domain::table::TableChunk;
use crate::error::Result;

/// Lazy, finite sequence of chunks. Not restartable mid-iteration.
pub type ChunkIter<'a> = Box<dyn Iterator<Item = Result<TableChunk>> + Send + 'a>;

/// Storage kind behind a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    FileBacked,
    StoreBacked,
}

/// Read access to one immutable tabular dataset.
///
/// Rows are molecules, columns are samples. Column identifiers are unique.
pub trait SourceStream: Send {
    /// Human-readable name used in logs and errors.
    fn name(&self) -> &str;

    /// Storage kind of this source.
    fn kind(&self) -> SourceKind;

    /// Sample identifiers in column order.
    fn samples(&self) -> Result<Vec<String>>;

    /// Non-missing values of one row, optionally restricted to `columns`.
    ///
    /// # Errors
    /// Returns [`Error::RowNotFound`](crate::error::Error::RowNotFound) when the
    /// row does not exist or has no values after filtering.
    fn specific_row(&self, id: &str, columns: Option<&[String]>) -> Result<Vec<f64>>;

    /// Chunks of the table; with `only_matching`, columns are restricted to
    /// the listed samples that the source has.
    fn chunked_table<'a>(&'a self, only_matching: Option<&'a [String]>) -> Result<ChunkIter<'a>>;

    /// The whole table as one chunk. Only for sources known to be small.
    fn full_table(&self, only_matching: Option<&[String]>) -> Result<TableChunk> {
        let mut full: Option<TableChunk> = None;
        for chunk in self.chunked_table(only_matching)? {
            let chunk = chunk?;
            match full.as_mut() {
                Some(acc) => acc.rows.extend(chunk.rows),
                None => full = Some(chunk),
            }
        }
        match full {
            Some(table) => Ok(table),
            None => {
                let mut columns = self.samples()?;
                if let Some(keep) = only_matching {
                    columns.retain(|c| keep.contains(c));
                }
                Ok(TableChunk {
                    index_label: String::new(),
                    columns,
                    rows: Vec::new(),
                })
            }
        }
    }

    /// Number of molecule rows.
    fn row_count(&self) -> Result<usize>;

    /// Number of sample columns.
    fn column_count(&self) -> Result<usize> {
        Ok(self.samples()?.len())
    }
}

/// Resolves source references stored on an experiment.
pub trait SourceCatalog: Send + Sync {
    /// Open the source behind `source`.
    fn open(&self, source: &SourceRef) -> Result<Box<dyn SourceStream>>;

    /// Load the CpG-site platform behind `platform`.
    fn cpg_platform(&self, platform: &SourceRef) -> Result<CpgPlatform>;
}

//! File-backed source over a delimited text file.
//!
//! The first header cell is the row-index label, the remaining cells are
//! sample identifiers. Empty, `NA`, `NaN` or unparsable cells are missing.

use std::fs::File;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};
use tracing::debug;

use super::{ensure_unique_samples, matching_positions};
use crate::domain::table::{TableChunk, TableRow};
use crate::error::{Error, Result};
use crate::port::outbound::source::{ChunkIter, SourceKind, SourceStream};

/// Parse one cell; `None` for anything that is not a finite number.
pub(crate) fn parse_value(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() || cell.eq_ignore_ascii_case("na") || cell.eq_ignore_ascii_case("null") {
        return None;
    }
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Delimited file read in fixed-size row chunks.
#[derive(Debug, Clone)]
pub struct FileSource {
    name: String,
    path: PathBuf,
    delimiter: u8,
    chunk_size: usize,
    index_label: String,
    samples: Vec<String>,
}

impl FileSource {
    /// Open `path` and read its header.
    ///
    /// # Errors
    /// Fails if the file cannot be read, has no header, or repeats a sample.
    pub fn open(path: impl AsRef<Path>, delimiter: u8, chunk_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let name = path.display().to_string();
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .from_path(&path)?;
        let header = reader.headers()?.clone();

        let mut cells = header.iter();
        let index_label = cells
            .next()
            .map(str::to_string)
            .ok_or_else(|| Error::Parse(format!("{name}: missing header row")))?;
        let samples: Vec<String> = cells.map(str::to_string).collect();
        ensure_unique_samples(&name, &samples)?;

        debug!(source = %name, samples = samples.len(), "Opened file source");
        Ok(Self {
            name,
            path,
            delimiter,
            chunk_size: chunk_size.max(1),
            index_label,
            samples,
        })
    }

    /// Path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn records(&self) -> Result<StringRecordsIntoIter<File>> {
        let reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .from_path(&self.path)?;
        Ok(reader.into_records())
    }

    fn row_from_record(&self, record: &StringRecord, positions: &[usize]) -> Result<TableRow> {
        let id = record
            .get(0)
            .ok_or_else(|| Error::Parse(format!("{}: empty record", self.name)))?;
        let values = positions
            .iter()
            .map(|&p| record.get(p + 1).and_then(parse_value))
            .collect();
        Ok(TableRow::new(id, values))
    }
}

struct FileChunks<'a> {
    source: &'a FileSource,
    records: StringRecordsIntoIter<File>,
    positions: Vec<usize>,
    columns: Vec<String>,
    finished: bool,
}

impl Iterator for FileChunks<'_> {
    type Item = Result<TableChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut rows = Vec::with_capacity(self.source.chunk_size);
        while rows.len() < self.source.chunk_size {
            match self.records.next() {
                Some(Ok(record)) => match self.source.row_from_record(&record, &self.positions) {
                    Ok(row) => rows.push(row),
                    Err(e) => {
                        self.finished = true;
                        return Some(Err(e));
                    }
                },
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e.into()));
                }
                None => {
                    self.finished = true;
                    break;
                }
            }
        }

        if rows.is_empty() {
            return None;
        }
        Some(Ok(TableChunk {
            index_label: self.source.index_label.clone(),
            columns: self.columns.clone(),
            rows,
        }))
    }
}

impl SourceStream for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::FileBacked
    }

    fn samples(&self) -> Result<Vec<String>> {
        Ok(self.samples.clone())
    }

    fn specific_row(&self, id: &str, columns: Option<&[String]>) -> Result<Vec<f64>> {
        let positions = matching_positions(&self.samples, columns);
        for record in self.records()? {
            let record = record?;
            if record.get(0) == Some(id) {
                let values: Vec<f64> = self
                    .row_from_record(&record, &positions)?
                    .values
                    .into_iter()
                    .flatten()
                    .collect();
                if values.is_empty() {
                    break;
                }
                return Ok(values);
            }
        }
        Err(Error::RowNotFound {
            row: id.to_string(),
            source_name: self.name.clone(),
        })
    }

    fn chunked_table<'a>(&'a self, only_matching: Option<&'a [String]>) -> Result<ChunkIter<'a>> {
        let positions = matching_positions(&self.samples, only_matching);
        let columns = positions.iter().map(|&p| self.samples[p].clone()).collect();
        Ok(Box::new(FileChunks {
            source: self,
            records: self.records()?,
            positions,
            columns,
            finished: false,
        }))
    }

    fn row_count(&self) -> Result<usize> {
        let mut count = 0;
        for record in self.records()? {
            record?;
            count += 1;
        }
        Ok(count)
    }

    fn column_count(&self) -> Result<usize> {
        Ok(self.samples.len())
    }
}

//! Staging-file preparation.
//!
//! Streams one source chunk by chunk into a cleaned, tab-delimited file the
//! correlation engine can consume: columns restricted to the common samples,
//! incomplete and low-variance rows dropped, CpG sites mapped to genes and
//! each row written at most once.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use csv::{Writer, WriterBuilder};
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::checkpoint;
use crate::domain::platform::CpgPlatform;
use crate::domain::table::TableRow;
use crate::error::Result;
use crate::port::outbound::source::SourceStream;

/// Header of the extra column holding the CpG site when mapping is applied.
pub const CPG_SITE_COLUMN: &str = "cpg_site";

/// A staging file ready for the engine.
///
/// The file is removed when this value is dropped, on every exit path.
#[derive(Debug)]
pub struct PreparedDataset {
    file: NamedTempFile,
    pub rows_written: usize,
    /// The row index holds gene symbols and the original CpG site sits in
    /// [`CPG_SITE_COLUMN`]. Results must be relabelled with the site.
    pub cpg_mapped: bool,
}

impl PreparedDataset {
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Size of the staged file in bytes.
    ///
    /// # Errors
    /// Fails if the file metadata cannot be read.
    pub fn size(&self) -> Result<u64> {
        Ok(self.file.as_file().metadata()?.len())
    }
}

/// Per-source cleaning parameters.
#[derive(Debug, Clone, Copy)]
pub struct StagingRequest<'a> {
    pub common_samples: &'a [String],
    /// Rows with a population standard deviation below this are dropped.
    /// Zero disables the filter.
    pub min_std_dev: f64,
    pub row_index_label: &'a str,
    pub cpg_platform: Option<&'a CpgPlatform>,
}

/// Writes staging files into one directory.
#[derive(Debug, Clone)]
pub struct DatasetPreparer {
    staging_dir: PathBuf,
}

impl DatasetPreparer {
    #[must_use]
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
        }
    }

    #[must_use]
    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Stream `source` into a new staging file.
    ///
    /// # Errors
    /// Returns [`Error::Stopped`](crate::error::Error::Stopped) as soon as
    /// `token` is observed cancelled, or any source or I/O error. The partial
    /// file is removed in both cases.
    pub fn prepare_staging_file(
        &self,
        source: &dyn SourceStream,
        request: StagingRequest<'_>,
        token: &CancellationToken,
    ) -> Result<PreparedDataset> {
        checkpoint(token)?;
        let mut file = tempfile::Builder::new()
            .prefix("omicorr-")
            .suffix(".tsv")
            .tempfile_in(&self.staging_dir)?;

        let rows_written = {
            let mut writer = WriterBuilder::new()
                .delimiter(b'\t')
                .has_headers(false)
                .from_writer(file.as_file_mut());
            let written = stream_rows(source, &request, &mut writer, token)?;
            writer.flush()?;
            written
        };
        checkpoint(token)?;

        debug!(
            source = source.name(),
            rows = rows_written,
            path = %file.path().display(),
            "Staging file written"
        );
        Ok(PreparedDataset {
            file,
            rows_written,
            cpg_mapped: request.cpg_platform.is_some(),
        })
    }
}

fn stream_rows<W: std::io::Write>(
    source: &dyn SourceStream,
    request: &StagingRequest<'_>,
    writer: &mut Writer<W>,
    token: &CancellationToken,
) -> Result<usize> {
    let mut header = vec![request.row_index_label.to_string()];
    if request.cpg_platform.is_some() {
        header.push(CPG_SITE_COLUMN.to_string());
    }
    header.extend(request.common_samples.iter().cloned());
    writer.write_record(&header)?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut written = 0;

    for chunk in source.chunked_table(Some(request.common_samples))? {
        checkpoint(token)?;
        let chunk = chunk?.reindex(request.common_samples);

        for row in &chunk.rows {
            // First occurrence wins even when the filters below drop it.
            if !seen.insert(row.id.clone()) {
                continue;
            }
            let Some(values) = complete_values(row) else {
                continue;
            };
            if request.min_std_dev > 0.0 && population_std_dev(&values) < request.min_std_dev {
                continue;
            }

            let mut record = Vec::with_capacity(values.len() + 2);
            match request.cpg_platform {
                Some(platform) => {
                    record.push(platform.gene_for(&row.id).to_string());
                    record.push(row.id.clone());
                }
                None => record.push(row.id.clone()),
            }
            record.extend(values.iter().map(f64::to_string));
            writer.write_record(&record)?;
            written += 1;
        }
    }

    Ok(written)
}

/// Values of a row with no missing entries.
fn complete_values(row: &TableRow) -> Option<Vec<f64>> {
    row.values.iter().copied().collect()
}

/// Standard deviation with `n` in the denominator.
pub(crate) fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::outbound::source::memory::MemorySource;
    use crate::error::Error;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn methylation() -> MemorySource {
        MemorySource::new(
            "methylation",
            "site",
            cols(&["S3", "S1", "S2", "S9"]),
            vec![
                TableRow::new("cg01", vec![Some(0.3), Some(0.1), Some(0.2), None]),
                TableRow::new("cg02", vec![Some(0.5), None, Some(0.5), Some(1.0)]),
                TableRow::new("cg03", vec![Some(0.4), Some(0.4), Some(0.4), Some(0.0)]),
                TableRow::new("cg01", vec![Some(0.9), Some(0.9), Some(0.1), Some(0.0)]),
            ],
        )
        .unwrap()
        .with_chunk_size(1)
    }

    fn read(prepared: &PreparedDataset) -> String {
        std::fs::read_to_string(prepared.path()).unwrap()
    }

    #[test]
    fn population_std_dev_uses_n() {
        assert!((population_std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]) - 2.0).abs() < 1e-12);
        assert_eq!(population_std_dev(&[]), 0.0);
    }

    #[test]
    fn restricts_reorders_and_deduplicates() {
        let dir = tempfile::tempdir().unwrap();
        let preparer = DatasetPreparer::new(dir.path());
        let common = cols(&["S1", "S2", "S3"]);

        let prepared = preparer
            .prepare_staging_file(
                &methylation(),
                StagingRequest {
                    common_samples: &common,
                    min_std_dev: 0.0,
                    row_index_label: "gem",
                    cpg_platform: None,
                },
                &CancellationToken::new(),
            )
            .unwrap();

        assert_eq!(prepared.rows_written, 2);
        assert!(!prepared.cpg_mapped);
        assert_eq!(
            read(&prepared),
            "gem\tS1\tS2\tS3\ncg01\t0.1\t0.2\t0.3\ncg03\t0.4\t0.4\t0.4\n"
        );
    }

    #[test]
    fn dropped_first_occurrence_hides_later_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let common = cols(&["S1", "S2"]);
        let source = MemorySource::new(
            "mirna",
            "mirna",
            cols(&["S1", "S2"]),
            vec![
                TableRow::new("hsa-mir-21", vec![Some(1.0), None]),
                TableRow::new("hsa-mir-155", vec![Some(2.0), Some(3.0)]),
                TableRow::new("hsa-mir-21", vec![Some(4.0), Some(5.0)]),
            ],
        )
        .unwrap();

        let prepared = DatasetPreparer::new(dir.path())
            .prepare_staging_file(
                &source,
                StagingRequest {
                    common_samples: &common,
                    min_std_dev: 0.0,
                    row_index_label: "gem",
                    cpg_platform: None,
                },
                &CancellationToken::new(),
            )
            .unwrap();

        assert_eq!(prepared.rows_written, 1);
        assert_eq!(read(&prepared), "gem\tS1\tS2\nhsa-mir-155\t2\t3\n");
    }

    #[test]
    fn drops_rows_below_std_dev_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let common = cols(&["S1", "S2", "S3"]);
        let prepared = DatasetPreparer::new(dir.path())
            .prepare_staging_file(
                &methylation(),
                StagingRequest {
                    common_samples: &common,
                    min_std_dev: 0.01,
                    row_index_label: "gem",
                    cpg_platform: None,
                },
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(prepared.rows_written, 1);
        assert!(!read(&prepared).contains("cg03"));
    }

    #[test]
    fn maps_cpg_sites_to_genes() {
        let dir = tempfile::tempdir().unwrap();
        let common = cols(&["S1", "S2", "S3"]);
        let platform = CpgPlatform::from_pairs([("cg01", "TP53")]);
        let prepared = DatasetPreparer::new(dir.path())
            .prepare_staging_file(
                &methylation(),
                StagingRequest {
                    common_samples: &common,
                    min_std_dev: 0.0,
                    row_index_label: "gem",
                    cpg_platform: Some(&platform),
                },
                &CancellationToken::new(),
            )
            .unwrap();

        assert!(prepared.cpg_mapped);
        let content = read(&prepared);
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("gem\tcpg_site\tS1\tS2\tS3"));
        assert_eq!(lines.next(), Some("TP53\tcg01\t0.1\t0.2\t0.3"));
        assert_eq!(lines.next(), Some("-\tcg03\t0.4\t0.4\t0.4"));
    }

    #[test]
    fn empty_source_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let source = MemorySource::new("empty", "gene", cols(&["S1"]), Vec::new()).unwrap();
        let common = cols(&["S1"]);
        let prepared = DatasetPreparer::new(dir.path())
            .prepare_staging_file(
                &source,
                StagingRequest {
                    common_samples: &common,
                    min_std_dev: 0.0,
                    row_index_label: "gene",
                    cpg_platform: None,
                },
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(prepared.rows_written, 0);
        assert_eq!(read(&prepared), "gene\tS1\n");
    }

    #[test]
    fn cancelled_token_stops_and_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let common = cols(&["S1"]);

        let err = DatasetPreparer::new(dir.path())
            .prepare_staging_file(
                &methylation(),
                StagingRequest {
                    common_samples: &common,
                    min_std_dev: 0.0,
                    row_index_label: "gem",
                    cpg_platform: None,
                },
                &token,
            )
            .unwrap_err();

        assert!(matches!(err, Error::Stopped));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn staging_file_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let common = cols(&["S1"]);
        let prepared = DatasetPreparer::new(dir.path())
            .prepare_staging_file(
                &methylation(),
                StagingRequest {
                    common_samples: &common,
                    min_std_dev: 0.0,
                    row_index_label: "gem",
                    cpg_platform: None,
                },
                &CancellationToken::new(),
            )
            .unwrap();
        let path = prepared.path().to_path_buf();
        assert!(path.exists());
        drop(prepared);
        assert!(!path.exists());
    }
}

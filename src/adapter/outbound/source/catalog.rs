//! File-system catalog of sources and CpG platforms.

use std::path::PathBuf;

use csv::ReaderBuilder;
use tracing::debug;

use super::file::FileSource;
use crate::domain::id::SourceRef;
use crate::domain::platform::CpgPlatform;
use crate::error::Result;
use crate::port::outbound::source::{SourceCatalog, SourceStream};

/// Resolves source references as paths, relative ones against `root`.
#[derive(Debug, Clone)]
pub struct FileSourceCatalog {
    root: Option<PathBuf>,
    delimiter: u8,
    chunk_size: usize,
}

impl FileSourceCatalog {
    #[must_use]
    pub fn new(delimiter: u8, chunk_size: usize) -> Self {
        Self {
            root: None,
            delimiter,
            chunk_size,
        }
    }

    /// Resolve relative references against `root`.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    fn resolve(&self, reference: &SourceRef) -> PathBuf {
        let path = PathBuf::from(reference.as_str());
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path,
        }
    }
}

impl SourceCatalog for FileSourceCatalog {
    fn open(&self, source: &SourceRef) -> Result<Box<dyn SourceStream>> {
        let source = FileSource::open(self.resolve(source), self.delimiter, self.chunk_size)?;
        Ok(Box::new(source))
    }

    /// Platform files have a header and two columns: CpG site, gene symbols.
    fn cpg_platform(&self, platform: &SourceRef) -> Result<CpgPlatform> {
        let path = self.resolve(platform);
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_path(&path)?;

        let mut pairs = Vec::new();
        for record in reader.records() {
            let record = record?;
            if let Some(site) = record.get(0) {
                pairs.push((site.to_string(), record.get(1).unwrap_or_default().to_string()));
            }
        }

        let platform = CpgPlatform::from_pairs(pairs);
        debug!(path = %path.display(), sites = platform.len(), "Loaded CpG platform");
        Ok(platform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn opens_relative_sources_under_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("mrna.tsv"), "gene\tS1\tS2\nBRCA1\t1\t2\n").unwrap();

        let catalog = FileSourceCatalog::new(b'\t', 100).with_root(dir.path());
        let source = catalog.open(&SourceRef::from("mrna.tsv")).unwrap();
        assert_eq!(source.samples().unwrap(), vec!["S1", "S2"]);
    }

    #[test]
    fn loads_platform_with_missing_gene_column() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("450k.tsv"),
            "site\tgene\ncg01\tTP53;WRAP53\ncg02\ncg03\tBRCA1\n",
        )
        .unwrap();

        let catalog = FileSourceCatalog::new(b'\t', 100).with_root(dir.path());
        let platform = catalog.cpg_platform(&SourceRef::from("450k.tsv")).unwrap();
        assert_eq!(platform.gene_for("cg01"), "TP53");
        assert_eq!(platform.gene_for("cg02"), "-");
        assert_eq!(platform.gene_for("cg03"), "BRCA1");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let catalog = FileSourceCatalog::new(b'\t', 100);
        assert!(catalog.open(&SourceRef::from("/nonexistent/x.tsv")).is_err());
    }
}

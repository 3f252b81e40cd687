//! Source reading configuration.

use std::path::PathBuf;

use serde::Deserialize;

/// How file-backed sources are read.
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    /// Rows per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Single-byte field delimiter.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Base directory for relative source references.
    #[serde(default)]
    pub root: Option<PathBuf>,
}

impl SourcesConfig {
    /// The delimiter as a byte. `"\t"` and `"tab"` both mean tab.
    #[must_use]
    pub fn delimiter_byte(&self) -> Option<u8> {
        match self.delimiter.as_str() {
            "tab" | "\\t" => Some(b'\t'),
            d if d.len() == 1 => d.bytes().next(),
            _ => None,
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            delimiter: default_delimiter(),
            root: None,
        }
    }
}

const fn default_chunk_size() -> usize {
    500
}

fn default_delimiter() -> String {
    "\t".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiter_spellings() {
        let mut config = SourcesConfig::default();
        assert_eq!(config.delimiter_byte(), Some(b'\t'));
        config.delimiter = "tab".into();
        assert_eq!(config.delimiter_byte(), Some(b'\t'));
        config.delimiter = ",".into();
        assert_eq!(config.delimiter_byte(), Some(b','));
        config.delimiter = ";;".into();
        assert_eq!(config.delimiter_byte(), None);
    }
}

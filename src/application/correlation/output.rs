//! Engine output files: tab-delimited results plus a JSON summary.

use std::path::Path;

use csv::ReaderBuilder;
use serde::Deserialize;

use crate::domain::result::CorrelationResult;
use crate::error::Result;

/// Counters reported next to the result rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EngineSummary {
    /// Rows that passed the threshold, before truncation.
    pub total_row_count: u64,
    /// Pairs evaluated.
    pub evaluated_row_count: u64,
}

#[derive(Debug, Deserialize)]
struct EngineRow {
    gene: String,
    gem: String,
    correlation: f64,
    p_value: f64,
    adjusted_p_value: Option<f64>,
    #[serde(default)]
    cpg_site_id: Option<String>,
}

impl EngineRow {
    fn into_result(self, relabel_cpg: bool) -> CorrelationResult {
        let gem = match (relabel_cpg, self.cpg_site_id) {
            (true, Some(site)) if !site.is_empty() => format!("{} ({site})", self.gem),
            _ => self.gem,
        };
        CorrelationResult {
            gene: self.gene,
            gem,
            correlation: self.correlation,
            p_value: self.p_value,
            adjusted_p_value: self.adjusted_p_value.unwrap_or(f64::NAN),
        }
    }
}

/// Read result rows. With `relabel_cpg`, gems become `"gene (cpg_site_id)"`.
///
/// # Errors
/// Fails on unreadable files or rows that do not match the header.
pub fn read_results(path: &Path, relabel_cpg: bool) -> Result<Vec<CorrelationResult>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(path)?;

    let mut results = Vec::new();
    for row in reader.deserialize::<EngineRow>() {
        results.push(row?.into_result(relabel_cpg));
    }
    Ok(results)
}

/// Read the JSON summary.
///
/// # Errors
/// Fails on unreadable or malformed files.
pub fn read_summary(path: &Path) -> Result<EngineSummary> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

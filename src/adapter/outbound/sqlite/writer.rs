//! Bulk result insertion.
//!
//! Results can run into millions of rows, so they are written with one
//! multi-row `INSERT` per chunk instead of one statement per row. Row values
//! are rendered as SQL literals; text is quoted with `'` doubled.

use std::fmt::Write as _;

use diesel::prelude::*;
use diesel::SqliteConnection;
use tracing::debug;

use crate::domain::id::ExperimentId;
use crate::domain::result::CorrelationResult;
use crate::error::{ConfigError, Result};

const COLUMNS: &str = "experiment_id, gene, gem, correlation, p_value, adjusted_p_value";

/// Writes result rows to one table in fixed-size chunks.
#[derive(Debug, Clone)]
pub struct ResultWriter {
    table: String,
    chunk_size: usize,
}

impl ResultWriter {
    /// # Errors
    /// Rejects table names that are not plain SQL identifiers.
    pub fn new(table: impl Into<String>, chunk_size: usize) -> Result<Self> {
        let table = table.into();
        if !is_identifier(&table) {
            return Err(ConfigError::InvalidValue {
                field: "results_table",
                reason: format!("'{table}' is not a plain SQL identifier"),
            }
            .into());
        }
        Ok(Self {
            table,
            chunk_size: chunk_size.max(1),
        })
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Insert `results` for `experiment_id`. Returns rows written.
    ///
    /// Visibility follows the caller's transaction, if any.
    ///
    /// # Errors
    /// Fails on the first chunk the database rejects.
    pub fn persist(
        &self,
        conn: &mut SqliteConnection,
        experiment_id: ExperimentId,
        results: &[CorrelationResult],
    ) -> Result<usize> {
        let mut written = 0;
        for chunk in results.chunks(self.chunk_size) {
            let statement = self.insert_statement(experiment_id, chunk);
            written += diesel::sql_query(statement).execute(conn)?;
        }
        debug!(
            experiment_id = %experiment_id,
            rows = written,
            table = %self.table,
            "Results persisted"
        );
        Ok(written)
    }

    fn insert_statement(&self, experiment_id: ExperimentId, chunk: &[CorrelationResult]) -> String {
        let mut sql = format!("INSERT INTO {} ({COLUMNS}) VALUES ", self.table);
        for (i, row) in chunk.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            let _ = write!(
                sql,
                "({}, {}, {}, {}, {}, {})",
                experiment_id.get(),
                quote(&row.gene),
                quote(&row.gem),
                number(row.correlation),
                number(row.p_value),
                number(row.adjusted_p_value),
            );
        }
        sql
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Finite values in exponent form; anything else is `NULL`.
fn number(value: f64) -> String {
    if value.is_finite() {
        format!("{value:e}")
    } else {
        "NULL".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(gene: &str, gem: &str) -> CorrelationResult {
        CorrelationResult {
            gene: gene.into(),
            gem: gem.into(),
            correlation: -0.5,
            p_value: 0.001,
            adjusted_p_value: f64::NAN,
        }
    }

    #[test]
    fn rejects_unsafe_table_names() {
        assert!(ResultWriter::new("experiment_results", 10).is_ok());
        assert!(ResultWriter::new("_results2", 10).is_ok());
        assert!(ResultWriter::new("results; DROP TABLE experiments", 10).is_err());
        assert!(ResultWriter::new("1results", 10).is_err());
        assert!(ResultWriter::new("", 10).is_err());
    }

    #[test]
    fn renders_escaped_multi_row_insert() {
        let writer = ResultWriter::new("experiment_results", 10).unwrap();
        let sql = writer.insert_statement(
            ExperimentId::new(4),
            &[row("BRCA1", "hsa-mir-21"), row("O'BRIEN", "5'UTR")],
        );
        assert_eq!(
            sql,
            "INSERT INTO experiment_results (experiment_id, gene, gem, correlation, p_value, adjusted_p_value) VALUES \
             (4, 'BRCA1', 'hsa-mir-21', -5e-1, 1e-3, NULL), \
             (4, 'O''BRIEN', '5''UTR', -5e-1, 1e-3, NULL)"
        );
    }
}

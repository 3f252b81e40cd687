//! Correlation results produced by the engine and persisted per experiment.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// One evaluated (molecule A, molecule B) pair that passed the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    /// Molecule identifier from dataset A.
    pub gene: String,
    /// Molecule identifier from dataset B.
    pub gem: String,
    pub correlation: f64,
    pub p_value: f64,
    pub adjusted_p_value: f64,
}

impl CorrelationResult {
    /// Ordering used for truncation: larger |correlation| first.
    #[must_use]
    pub fn strength_order(a: &Self, b: &Self) -> Ordering {
        b.correlation.abs().total_cmp(&a.correlation.abs())
    }
}

/// Everything a correlation run hands back to the executor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrelationOutcome {
    /// Rows kept after threshold filtering and truncation.
    pub results: Vec<CorrelationResult>,
    /// Rows that passed the threshold, before truncation.
    pub total_row_count: u64,
    /// Pairs evaluated by the engine.
    pub evaluated_row_count: u64,
}

impl CorrelationOutcome {
    /// Drop rows with |correlation| below `min` and recount the survivors.
    pub fn apply_threshold(&mut self, min: f64) {
        self.results.retain(|row| row.correlation.abs() >= min);
        self.total_row_count = self.results.len() as u64;
    }

    /// Keep only the `limit` strongest rows. `total_row_count` is left as is.
    pub fn truncate_top(&mut self, limit: Option<usize>) {
        if let Some(limit) = limit {
            if self.results.len() > limit {
                self.results.sort_by(CorrelationResult::strength_order);
                self.results.truncate(limit);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(gem: &str, correlation: f64) -> CorrelationResult {
        CorrelationResult {
            gene: "BRCA1".into(),
            gem: gem.into(),
            correlation,
            p_value: 0.01,
            adjusted_p_value: 0.02,
        }
    }

    #[test]
    fn truncate_keeps_strongest_by_absolute_value() {
        let mut outcome = CorrelationOutcome {
            results: vec![row("a", 0.5), row("b", -0.95), row("c", 0.8), row("d", 0.1)],
            total_row_count: 4,
            evaluated_row_count: 10,
        };
        outcome.truncate_top(Some(2));

        let gems: Vec<_> = outcome.results.iter().map(|r| r.gem.as_str()).collect();
        assert_eq!(gems, vec!["b", "c"]);
        assert_eq!(outcome.total_row_count, 4);
    }

    #[test]
    fn truncate_without_limit_is_noop() {
        let mut outcome = CorrelationOutcome {
            results: vec![row("a", 0.5), row("b", 0.9)],
            total_row_count: 2,
            evaluated_row_count: 2,
        };
        outcome.truncate_top(None);
        assert_eq!(outcome.results[0].gem, "a");
    }

    #[test]
    fn threshold_recounts_surviving_rows() {
        let mut outcome = CorrelationOutcome {
            results: vec![row("a", 0.5), row("b", -0.95), row("c", 0.49), row("d", -0.2)],
            total_row_count: 4,
            evaluated_row_count: 4,
        };
        outcome.apply_threshold(0.5);

        let gems: Vec<_> = outcome.results.iter().map(|r| r.gem.as_str()).collect();
        assert_eq!(gems, vec!["a", "b"]);
        assert_eq!(outcome.total_row_count, 2);
        assert_eq!(outcome.evaluated_row_count, 4);
    }
}

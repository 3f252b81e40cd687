//! Streaming multiple-testing correction.
//!
//! The step-up methods (Benjamini-Hochberg, Benjamini-Yekutieli) are only
//! correct when p-values arrive in **descending** order across all batches.
//! Callers sort; adjusters never re-sort, so the full set never has to be
//! held at once. Rank bookkeeping is global, which makes the output
//! independent of where batch boundaries fall.

use crate::domain::experiment::AdjustmentMethod;
use crate::domain::result::CorrelationResult;

/// Order in which an adjuster must receive raw p-values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PValueOrder {
    Descending,
    /// Any order is fine.
    None,
}

/// Batched p-value adjustment over a stream of `N` values.
pub trait PValueAdjuster: Send {
    fn required_order(&self) -> PValueOrder;

    /// Reserve ranks for the next `count` values.
    fn prepare_batch(&mut self, count: usize);

    /// Adjust the value at `index` within the current batch.
    fn adjust(&mut self, p_value: f64, index: usize) -> f64;
}

/// `min(p * N, 1)`.
#[derive(Debug, Clone)]
pub struct Bonferroni {
    total: usize,
}

impl Bonferroni {
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self { total }
    }
}

impl PValueAdjuster for Bonferroni {
    fn required_order(&self) -> PValueOrder {
        PValueOrder::None
    }

    fn prepare_batch(&mut self, _count: usize) {}

    fn adjust(&mut self, p_value: f64, _index: usize) -> f64 {
        (p_value * self.total as f64).min(1.0)
    }
}

/// Step-up FDR control with a running minimum.
///
/// The first value consumed gets rank `N`, the next `N - 1`, and so on.
/// Benjamini-Yekutieli scales every value by the harmonic sum `Σ 1/k`.
#[derive(Debug, Clone)]
pub struct StepUp {
    total: usize,
    multiplier: f64,
    position: usize,
    batch_start: usize,
    previous: f64,
}

impl StepUp {
    #[must_use]
    pub fn benjamini_hochberg(total: usize) -> Self {
        Self::with_multiplier(total, 1.0)
    }

    #[must_use]
    pub fn benjamini_yekutieli(total: usize) -> Self {
        let harmonic: f64 = (1..=total).map(|k| 1.0 / k as f64).sum();
        Self::with_multiplier(total, harmonic)
    }

    fn with_multiplier(total: usize, multiplier: f64) -> Self {
        Self {
            total,
            multiplier,
            position: 0,
            batch_start: 0,
            previous: f64::INFINITY,
        }
    }
}

impl PValueAdjuster for StepUp {
    fn required_order(&self) -> PValueOrder {
        PValueOrder::Descending
    }

    fn prepare_batch(&mut self, count: usize) {
        self.batch_start = self.position;
        self.position += count;
    }

    fn adjust(&mut self, p_value: f64, index: usize) -> f64 {
        let rank = self.total.saturating_sub(self.batch_start + index).max(1);
        let n = self.total as f64;
        let adjusted = (p_value * n / rank as f64 * self.multiplier)
            .min(1.0)
            .min(self.previous);
        self.previous = adjusted;
        adjusted
    }
}

/// Adjuster for `method` over `total` p-values.
#[must_use]
pub fn adjuster_for(method: AdjustmentMethod, total: usize) -> Box<dyn PValueAdjuster> {
    match method {
        AdjustmentMethod::Bonferroni => Box::new(Bonferroni::new(total)),
        AdjustmentMethod::BenjaminiHochberg => Box::new(StepUp::benjamini_hochberg(total)),
        AdjustmentMethod::BenjaminiYekutieli => Box::new(StepUp::benjamini_yekutieli(total)),
    }
}

/// Fill `adjusted_p_value` of every result, `batch_size` rows at a time.
///
/// `total` is the number of tests performed, which is never less than the
/// number of rows. Results are left sorted in the order the adjuster
/// required.
pub fn adjust_results(
    results: &mut [CorrelationResult],
    method: AdjustmentMethod,
    total: usize,
    batch_size: usize,
) {
    let mut adjuster = adjuster_for(method, total.max(results.len()));
    if adjuster.required_order() == PValueOrder::Descending {
        results.sort_by(|a, b| b.p_value.total_cmp(&a.p_value));
    }

    for batch in results.chunks_mut(batch_size.max(1)) {
        adjuster.prepare_batch(batch.len());
        for (index, row) in batch.iter_mut().enumerate() {
            row.adjusted_p_value = adjuster.adjust(row.p_value, index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    fn run(adjuster: &mut dyn PValueAdjuster, descending: &[f64], batches: &[usize]) -> Vec<f64> {
        let mut out = Vec::with_capacity(descending.len());
        let mut offset = 0;
        for &size in batches {
            adjuster.prepare_batch(size);
            for i in 0..size {
                out.push(adjuster.adjust(descending[offset + i], i));
            }
            offset += size;
        }
        out
    }

    /// Textbook BH over ascending p-values: `p_i * N / i`, cumulative min from the top.
    fn reference_bh(ascending: &[f64]) -> Vec<f64> {
        let n = ascending.len() as f64;
        let mut q: Vec<f64> = ascending
            .iter()
            .enumerate()
            .map(|(i, p)| (p * n / (i + 1) as f64).min(1.0))
            .collect();
        for i in (0..q.len().saturating_sub(1)).rev() {
            q[i] = q[i].min(q[i + 1]);
        }
        q
    }

    fn sample_p_values() -> Vec<f64> {
        let mut p: Vec<f64> = vec![
            0.0001, 0.0004, 0.0019, 0.0095, 0.0201, 0.0278, 0.0298, 0.0344, 0.0459, 0.3240,
            0.4262, 0.5719, 0.6528, 0.7590, 1.0,
        ];
        p.sort_by(|a, b| b.total_cmp(a));
        p
    }

    #[test]
    fn bonferroni_scales_and_caps() {
        assert_eq!(Bonferroni::new(3).adjust(0.5, 0), 1.0);
        assert!((Bonferroni::new(4).adjust(0.1, 0) - 0.4).abs() < EPS);
        assert_eq!(Bonferroni::new(4).required_order(), PValueOrder::None);
    }

    #[test]
    fn benjamini_hochberg_enforces_running_minimum() {
        let mut bh = StepUp::benjamini_hochberg(3);
        let out = run(&mut bh, &[0.03, 0.02, 0.01], &[3]);
        for q in out {
            assert!((q - 0.03).abs() < EPS);
        }
    }

    #[test]
    fn benjamini_hochberg_matches_reference() {
        let descending = sample_p_values();
        let mut bh = StepUp::benjamini_hochberg(descending.len());
        let mut streamed = run(&mut bh, &descending, &[descending.len()]);
        streamed.sort_by(f64::total_cmp);

        let mut ascending = descending.clone();
        ascending.reverse();
        let expected = reference_bh(&ascending);

        for (got, want) in streamed.iter().zip(&expected) {
            assert!((got - want).abs() < EPS, "got {got}, want {want}");
        }
    }

    #[test]
    fn batch_boundaries_do_not_change_output() {
        let descending = sample_p_values();
        let n = descending.len();
        for make in [StepUp::benjamini_hochberg, StepUp::benjamini_yekutieli] {
            let single = run(&mut make(n), &descending, &[n]);
            let split = run(&mut make(n), &descending, &[1, 4, 2, 7, 1]);
            assert_eq!(single, split);
        }
    }

    #[test]
    fn benjamini_yekutieli_dominates_benjamini_hochberg() {
        let descending = sample_p_values();
        let n = descending.len();
        let bh = run(&mut StepUp::benjamini_hochberg(n), &descending, &[n]);
        let by = run(&mut StepUp::benjamini_yekutieli(n), &descending, &[n]);
        for (h, y) in bh.iter().zip(&by) {
            assert!(y >= h);
        }
        assert!(by.iter().zip(&bh).any(|(y, h)| y > h));

        let single_bh = run(&mut StepUp::benjamini_hochberg(1), &[0.2], &[1]);
        let single_by = run(&mut StepUp::benjamini_yekutieli(1), &[0.2], &[1]);
        assert_eq!(single_bh, single_by);
    }

    #[test]
    fn adjust_results_sorts_descending_for_step_up() {
        let row = |gem: &str, p: f64| CorrelationResult {
            gene: "BRCA1".into(),
            gem: gem.into(),
            correlation: 0.9,
            p_value: p,
            adjusted_p_value: f64::NAN,
        };
        let mut results = vec![row("a", 0.01), row("b", 0.03), row("c", 0.02)];
        adjust_results(&mut results, AdjustmentMethod::BenjaminiHochberg, 3, 2);

        let gems: Vec<_> = results.iter().map(|r| r.gem.as_str()).collect();
        assert_eq!(gems, vec!["b", "c", "a"]);
        assert!(results.iter().all(|r| (r.adjusted_p_value - 0.03).abs() < EPS));
    }

    #[test]
    fn adjust_results_bonferroni_keeps_order() {
        let mut results = vec![
            CorrelationResult {
                gene: "g".into(),
                gem: "a".into(),
                correlation: 0.8,
                p_value: 0.1,
                adjusted_p_value: 0.0,
            },
            CorrelationResult {
                gene: "g".into(),
                gem: "b".into(),
                correlation: 0.8,
                p_value: 0.4,
                adjusted_p_value: 0.0,
            },
        ];
        adjust_results(&mut results, AdjustmentMethod::Bonferroni, 2, 10);
        assert_eq!(results[0].gem, "a");
        assert!((results[0].adjusted_p_value - 0.2).abs() < EPS);
        assert_eq!(results[1].adjusted_p_value, 0.8);
    }

    #[test]
    fn adjust_results_counts_every_test_performed() {
        let row = |gem: &str, p: f64| CorrelationResult {
            gene: "BRCA1".into(),
            gem: gem.into(),
            correlation: 0.9,
            p_value: p,
            adjusted_p_value: f64::NAN,
        };

        let mut results = vec![row("a", 0.0001), row("b", 0.001)];
        adjust_results(&mut results, AdjustmentMethod::Bonferroni, 1000, 10);
        assert!((results[0].adjusted_p_value - 0.1).abs() < EPS);
        assert_eq!(results[1].adjusted_p_value, 1.0);

        let mut results = vec![row("a", 0.0001), row("b", 0.9)];
        adjust_results(&mut results, AdjustmentMethod::BenjaminiHochberg, 1000, 10);
        assert_eq!(results[0].gem, "b");
        assert!((results[0].adjusted_p_value - 0.9).abs() < EPS);
        assert!((results[1].adjusted_p_value - 0.0001 * 1000.0 / 999.0).abs() < EPS);
    }

    #[test]
    fn adjust_results_never_uses_fewer_tests_than_rows() {
        let mut results = vec![CorrelationResult {
            gene: "g".into(),
            gem: "a".into(),
            correlation: 0.8,
            p_value: 0.1,
            adjusted_p_value: 0.0,
        }; 3];
        adjust_results(&mut results, AdjustmentMethod::Bonferroni, 0, 10);
        assert!(results.iter().all(|r| (r.adjusted_p_value - 0.3).abs() < EPS));
    }
}

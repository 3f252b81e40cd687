//! One experiment run, end to end, without touching experiment state.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::application::adjustment::adjust_results;
use crate::application::alignment::common_samples;
use crate::application::checkpoint;
use crate::application::correlation::{CorrelationInvoker, CorrelationRequest};
use crate::application::preparation::{DatasetPreparer, StagingRequest};
use crate::domain::experiment::Experiment;
use crate::domain::result::CorrelationOutcome;
use crate::error::{Error, Result};
use crate::port::outbound::source::{SourceCatalog, SourceStream};

const GENE_LABEL: &str = "gene";
const GEM_LABEL: &str = "gem";

/// Align, stage, correlate and (when the engine does not) adjust.
pub struct Pipeline {
    catalog: Arc<dyn SourceCatalog>,
    preparer: DatasetPreparer,
    invoker: CorrelationInvoker,
    adjustment_batch_size: usize,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn SourceCatalog>,
        preparer: DatasetPreparer,
        invoker: CorrelationInvoker,
        adjustment_batch_size: usize,
    ) -> Self {
        Self {
            catalog,
            preparer,
            invoker,
            adjustment_batch_size,
        }
    }

    /// Run `experiment`. Staging files are removed before this returns.
    ///
    /// # Errors
    /// [`Error::NoSamplesInCommon`] when the sources share no sample,
    /// [`Error::Stopped`] when `token` is observed cancelled, and any source,
    /// staging or engine failure.
    pub fn run(&self, experiment: &Experiment, token: &CancellationToken) -> Result<CorrelationOutcome> {
        let spec = &experiment.spec;
        let sources = experiment
            .sources()
            .into_iter()
            .map(|reference| self.catalog.open(reference))
            .collect::<Result<Vec<_>>>()?;
        let views: Vec<&dyn SourceStream> = sources.iter().map(|s| s.as_ref()).collect();

        checkpoint(token)?;
        let samples = common_samples(&views, true)?;
        if samples.is_empty() {
            return Err(Error::NoSamplesInCommon);
        }
        debug!(experiment_id = %experiment.id, samples = samples.len(), "Aligned sources");

        let platform = match (&spec.cpg_platform, experiment.is_cpg_analysis()) {
            (Some(reference), true) => Some(self.catalog.cpg_platform(reference)?),
            _ => None,
        };

        let staged_a = self.preparer.prepare_staging_file(
            views[0],
            StagingRequest {
                common_samples: &samples,
                min_std_dev: spec.min_std_dev_a,
                row_index_label: GENE_LABEL,
                cpg_platform: None,
            },
            token,
        )?;
        let staged_b = self.preparer.prepare_staging_file(
            views[1],
            StagingRequest {
                common_samples: &samples,
                min_std_dev: spec.min_std_dev_b,
                row_index_label: GEM_LABEL,
                cpg_platform: platform.as_ref(),
            },
            token,
        )?;
        info!(
            experiment_id = %experiment.id,
            rows_a = staged_a.rows_written,
            rows_b = staged_b.rows_written,
            "Datasets staged"
        );

        let engine_adjusts = self.invoker.config().adjusts_p_values;
        let request = CorrelationRequest {
            dataset_a: staged_a.path(),
            dataset_b: staged_b.path(),
            method: spec.correlation_method,
            threshold: if engine_adjusts { spec.min_correlation } else { 0.0 },
            adjustment: engine_adjusts.then_some(spec.adjustment_method),
            all_vs_all: spec.all_vs_all,
            is_cpg_analysis: staged_b.cpg_mapped,
            keep_top_n: if engine_adjusts { spec.result_limit } else { None },
        };

        checkpoint(token)?;
        let mut outcome = self.invoker.run(&request, token)?;
        checkpoint(token)?;

        // Raw mode: every evaluated pair came back, so N is the evaluated count.
        if !engine_adjusts {
            let tests = usize::try_from(outcome.evaluated_row_count).unwrap_or(usize::MAX);
            adjust_results(
                &mut outcome.results,
                spec.adjustment_method,
                tests,
                self.adjustment_batch_size,
            );
            outcome.apply_threshold(spec.min_correlation);
            outcome.truncate_top(spec.result_limit);
            debug!(
                experiment_id = %experiment.id,
                tests,
                kept = outcome.total_row_count,
                "Adjusted raw p-values"
            );
        }
        Ok(outcome)
    }
}

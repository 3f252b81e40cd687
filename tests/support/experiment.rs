use std::path::Path;

use omicorr::domain::experiment::{
    AdjustmentMethod, CorrelationMethod, ExperimentKind, ExperimentSpec,
};
use omicorr::domain::id::SourceRef;

pub fn spec(name: &str, source_a: &Path, source_b: &Path) -> ExperimentSpec {
    ExperimentSpec {
        name: name.into(),
        kind: ExperimentKind::Mirna,
        source_a: SourceRef::new(source_a.display().to_string()),
        source_b: SourceRef::new(source_b.display().to_string()),
        clinical_source: None,
        cpg_platform: None,
        correlation_method: CorrelationMethod::Pearson,
        adjustment_method: AdjustmentMethod::BenjaminiHochberg,
        min_correlation: 0.5,
        min_std_dev_a: 0.0,
        min_std_dev_b: 0.0,
        all_vs_all: true,
        result_limit: None,
    }
}

//! Handler for the `submit` command.

use serde_json::json;

use crate::adapter::inbound::cli::command::SubmitArgs;
use crate::adapter::inbound::cli::output;
use crate::domain::experiment::ExperimentSpec;
use crate::domain::id::SourceRef;
use crate::error::Result;
use crate::infrastructure::bootstrap::build_store;
use crate::infrastructure::config::settings::Config;

impl SubmitArgs {
    fn to_spec(&self) -> ExperimentSpec {
        ExperimentSpec {
            name: self.name.clone(),
            kind: self.kind,
            source_a: SourceRef::new(&self.source_a),
            source_b: SourceRef::new(&self.source_b),
            clinical_source: self.clinical.as_deref().map(SourceRef::new),
            cpg_platform: self.cpg_platform.as_deref().map(SourceRef::new),
            correlation_method: self.method,
            adjustment_method: self.adjustment,
            min_correlation: self.min_correlation,
            min_std_dev_a: self.min_std_dev_a,
            min_std_dev_b: self.min_std_dev_b,
            all_vs_all: !self.matching_only,
            result_limit: self.top_n,
        }
    }
}

/// Execute the submit command.
///
/// # Errors
/// Fails if the experiment is invalid or cannot be stored.
pub fn execute(config: &Config, args: &SubmitArgs) -> Result<()> {
    let store = build_store(config)?;
    let experiment = store.insert(&args.to_spec())?;

    if output::is_json() {
        output::json_output(json!({
            "command": "submit",
            "id": experiment.id.get(),
            "state": experiment.state.as_str(),
        }));
        return Ok(());
    }

    output::success(&format!(
        "Submitted experiment {} ({})",
        experiment.id, experiment.spec.name
    ));
    Ok(())
}

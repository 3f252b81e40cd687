//! Handler for the `status` command.

use serde_json::json;
use tabled::{Table, Tabled};

use crate::adapter::inbound::cli::command::StatusArgs;
use crate::adapter::inbound::cli::output;
use crate::domain::experiment::Experiment;
use crate::domain::id::ExperimentId;
use crate::domain::result::CorrelationResult;
use crate::error::Result;
use crate::infrastructure::bootstrap::build_store;
use crate::infrastructure::config::settings::Config;
use crate::port::outbound::store::ExperimentStore;

#[derive(Tabled)]
struct ExperimentRow {
    #[tabled(rename = "Id")]
    id: i32,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: &'static str,
    #[tabled(rename = "State")]
    state: &'static str,
    #[tabled(rename = "Attempt")]
    attempt: u32,
    #[tabled(rename = "Evaluated")]
    evaluated: String,
    #[tabled(rename = "Total")]
    total: String,
    #[tabled(rename = "Final")]
    kept: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

impl From<&Experiment> for ExperimentRow {
    fn from(experiment: &Experiment) -> Self {
        Self {
            id: experiment.id.get(),
            name: experiment.spec.name.clone(),
            kind: experiment.spec.kind.as_str(),
            state: experiment.state.as_str(),
            attempt: experiment.attempt,
            evaluated: count(experiment.evaluated_row_count),
            total: count(experiment.result_total_row_count),
            kept: count(experiment.result_final_row_count),
            updated: experiment.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "Gene")]
    gene: String,
    #[tabled(rename = "GEM")]
    gem: String,
    #[tabled(rename = "Correlation")]
    correlation: String,
    #[tabled(rename = "P-value")]
    p_value: String,
    #[tabled(rename = "Adjusted")]
    adjusted: String,
}

impl From<&CorrelationResult> for ResultRow {
    fn from(result: &CorrelationResult) -> Self {
        Self {
            gene: result.gene.clone(),
            gem: result.gem.clone(),
            correlation: format!("{:.4}", result.correlation),
            p_value: format!("{:.3e}", result.p_value),
            adjusted: format!("{:.3e}", result.adjusted_p_value),
        }
    }
}

fn count(value: Option<u64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// Execute the status command.
///
/// # Errors
/// Fails if the store cannot be read.
pub fn execute(config: &Config, args: &StatusArgs) -> Result<()> {
    let store = build_store(config)?;
    match args.id {
        Some(id) => show_one(store.as_ref(), ExperimentId::new(id), args.results),
        None => show_all(store.as_ref()),
    }
}

fn show_all(store: &dyn ExperimentStore) -> Result<()> {
    let experiments = store.list()?;

    if output::is_json() {
        let items: Vec<_> = experiments.iter().map(experiment_json).collect();
        output::json_output(json!({ "command": "status", "experiments": items }));
        return Ok(());
    }
    if output::is_quiet() {
        return Ok(());
    }

    output::header(env!("CARGO_PKG_VERSION"));
    if experiments.is_empty() {
        output::warning("No experiments submitted yet");
        return Ok(());
    }
    output::section("Experiments");
    let rows: Vec<ExperimentRow> = experiments.iter().map(ExperimentRow::from).collect();
    output::lines(&Table::new(rows).to_string());
    Ok(())
}

fn show_one(store: &dyn ExperimentStore, id: ExperimentId, results: Option<usize>) -> Result<()> {
    let Some(experiment) = store.get(id)? else {
        output::warning(&format!("Experiment {id} not found"));
        return Ok(());
    };
    let top = match results {
        Some(n) => {
            let mut rows = store.results(id)?;
            rows.truncate(n);
            rows
        }
        None => Vec::new(),
    };

    if output::is_json() {
        let mut payload = experiment_json(&experiment);
        payload["results"] = top
            .iter()
            .map(|r| {
                json!({
                    "gene": r.gene,
                    "gem": r.gem,
                    "correlation": r.correlation,
                    "p_value": r.p_value,
                    "adjusted_p_value": r.adjusted_p_value,
                })
            })
            .collect();
        output::json_output(payload);
        return Ok(());
    }

    let spec = &experiment.spec;
    output::header(env!("CARGO_PKG_VERSION"));
    output::field("Id", experiment.id);
    output::field("Name", &spec.name);
    output::field("Kind", spec.kind);
    output::field("State", experiment.state);
    output::field("Attempt", experiment.attempt);
    output::field("Source A", &spec.source_a);
    output::field("Source B", &spec.source_b);
    if let Some(clinical) = &spec.clinical_source {
        output::field("Clinical", clinical);
    }
    if let Some(platform) = &spec.cpg_platform {
        output::field("Platform", platform);
    }
    output::field("Method", spec.correlation_method);
    output::field("Adjustment", spec.adjustment_method);
    output::field("Threshold", spec.min_correlation);
    output::field("Evaluated", count(experiment.evaluated_row_count));
    output::field("Total", count(experiment.result_total_row_count));
    output::field("Final", count(experiment.result_final_row_count));
    output::field("Submitted", experiment.submitted_at.to_rfc3339());
    output::field("Updated", experiment.updated_at.to_rfc3339());

    if !top.is_empty() {
        output::section("Strongest correlations");
        let rows: Vec<ResultRow> = top.iter().map(ResultRow::from).collect();
        output::lines(&Table::new(rows).to_string());
    }
    Ok(())
}

fn experiment_json(experiment: &Experiment) -> serde_json::Value {
    json!({
        "id": experiment.id.get(),
        "name": experiment.spec.name,
        "kind": experiment.spec.kind.as_str(),
        "state": experiment.state.as_str(),
        "attempt": experiment.attempt,
        "evaluated_row_count": experiment.evaluated_row_count,
        "result_total_row_count": experiment.result_total_row_count,
        "result_final_row_count": experiment.result_final_row_count,
        "submitted_at": experiment.submitted_at.to_rfc3339(),
        "updated_at": experiment.updated_at.to_rfc3339(),
    })
}

//! Handler for the `stop` command.

use serde_json::json;

use crate::adapter::inbound::cli::command::StopArgs;
use crate::adapter::inbound::cli::output;
use crate::application::executor::{request_stop, StopOutcome};
use crate::domain::id::ExperimentId;
use crate::error::Result;
use crate::infrastructure::bootstrap::build_store;
use crate::infrastructure::config::settings::Config;

/// Execute the stop command.
///
/// # Errors
/// Fails if the store cannot be read or written.
pub fn execute(config: &Config, args: &StopArgs) -> Result<()> {
    let store = build_store(config)?;
    let id = ExperimentId::new(args.id);
    let outcome = request_stop(store.as_ref(), id)?;

    if output::is_json() {
        output::json_output(json!({
            "command": "stop",
            "id": args.id,
            "outcome": format!("{outcome:?}").to_lowercase(),
        }));
        return Ok(());
    }

    match outcome {
        StopOutcome::Stopped => output::success(&format!("Experiment {id} stopped")),
        StopOutcome::Stopping => {
            output::success(&format!("Experiment {id} is stopping"));
        }
        StopOutcome::AlreadyFinished => {
            output::warning(&format!("Experiment {id} has already finished"));
        }
        StopOutcome::NotFound => output::warning(&format!("Experiment {id} not found")),
    }
    Ok(())
}

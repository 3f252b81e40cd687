//! Handler for the `run` command.
//!
//! Hosts a [`JobExecutor`] and keeps it in step with the store: new
//! submissions are queued and `STOPPING` requests written by other
//! processes are delivered to the running workers.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::signal;
use tracing::{info, warn};

use crate::adapter::inbound::cli::command::RunArgs;
use crate::adapter::inbound::cli::output;
use crate::application::executor::{JobExecutor, SubmitOutcome};
use crate::domain::experiment::ExperimentState;
use crate::error::Result;
use crate::infrastructure::bootstrap::{build_catalog, build_executor, build_store};
use crate::infrastructure::config::settings::Config;
use crate::port::outbound::store::ExperimentStore;

/// Execute the run command.
///
/// # Errors
/// Fails if the store or executor cannot be built, or recovery fails.
pub async fn execute(config: &Config, args: &RunArgs) -> Result<()> {
    let store = build_store(config)?;
    let catalog = build_catalog(config)?;
    let executor = build_executor(config, store.clone(), catalog, Handle::current())?;

    output::header(env!("CARGO_PKG_VERSION"));
    output::field("Database", &config.database);
    output::field("Workers", config.executor.max_workers);
    output::field("Engine", &config.engine.program);

    let report = executor.recover_pending()?;
    if report.requeued + report.stopped + report.exhausted > 0 {
        output::field("Requeued", report.requeued);
        output::field("Stopped", report.stopped);
        output::field("Exhausted", report.exhausted);
    }

    if args.drain {
        sync(store.as_ref(), &executor)?;
        executor.wait_idle().await;
        output::success("All pending experiments finished");
        return Ok(());
    }

    output::success("Executor running; press Ctrl-C to exit");
    let mut ticker = tokio::time::interval(Duration::from_millis(args.poll_ms.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = sync(store.as_ref(), &executor) {
                    warn!(error = %e, "Store sync failed");
                }
            }
            _ = signal::ctrl_c() => {
                info!(in_flight = executor.in_flight(), "Shutdown requested");
                output::warning("Shutting down; unfinished experiments resume on next start");
                return Ok(());
            }
        }
    }
}

/// Queue waiting experiments and deliver pending stop requests.
fn sync(store: &dyn ExperimentStore, executor: &JobExecutor) -> Result<()> {
    for experiment in store.with_state(&[ExperimentState::WaitingForQueue])? {
        if executor.submit(experiment.id) == SubmitOutcome::Queued {
            info!(experiment_id = %experiment.id, name = %experiment.spec.name, "Picked up submission");
        }
    }
    for experiment in store.with_state(&[ExperimentState::Stopping])? {
        let outcome = executor.stop(experiment.id)?;
        info!(experiment_id = %experiment.id, outcome = ?outcome, "Delivered stop request");
    }
    Ok(())
}

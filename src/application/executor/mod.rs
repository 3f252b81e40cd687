//! Experiment execution: bounded worker pool, per-experiment cancellation,
//! the experiment state machine, commit or rollback, bounded retries and
//! startup recovery.
//!
//! ```text
//! WAITING_FOR_QUEUE ──pickup──▶ IN_PROCESS ──▶ COMPLETED
//!        │                         ├──▶ NO_SAMPLES_IN_COMMON
//!        │                         ├──▶ FINISHED_WITH_ERROR
//!        │                         ├──▶ WAITING_FOR_QUEUE (storage unavailable)
//!        │                         └──▶ STOPPING ──▶ STOPPED
//!        └──stop while queued──▶ STOPPED
//! ```

mod pipeline;
mod registry;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub use pipeline::Pipeline;
use registry::{Cancelled, Registry, Ticket};

use crate::application::checkpoint;
use crate::application::correlation::{CorrelationInvoker, EngineConfig};
use crate::application::preparation::DatasetPreparer;
use crate::domain::experiment::{Experiment, ExperimentState};
use crate::domain::id::ExperimentId;
use crate::domain::result::CorrelationOutcome;
use crate::error::{Error, Result};
use crate::port::outbound::source::SourceCatalog;
use crate::port::outbound::store::{CommitMode, ExperimentStore};

/// Worker pool and retry settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorConfig {
    /// Experiments running at the same time.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Pickups allowed before an experiment is given up on.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Commit results in one transaction; otherwise delete partial rows on failure.
    #[serde(default = "default_transactional")]
    pub transactional: bool,
    /// Delay before a storage-unavailable experiment is picked up again.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Result rows per bulk insert statement.
    #[serde(default = "default_result_chunk_size")]
    pub result_chunk_size: usize,
    #[serde(default = "default_results_table")]
    pub results_table: String,
    /// Where staging and engine output files go. Defaults to the OS temp dir.
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
    /// P-values adjusted per batch when adjustment runs locally.
    #[serde(default = "default_adjustment_batch_size")]
    pub adjustment_batch_size: usize,
}

impl ExecutorConfig {
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    #[must_use]
    pub fn commit_mode(&self) -> CommitMode {
        CommitMode::from_transactional(self.transactional)
    }

    #[must_use]
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            max_attempts: default_max_attempts(),
            transactional: default_transactional(),
            retry_delay_ms: default_retry_delay_ms(),
            result_chunk_size: default_result_chunk_size(),
            results_table: default_results_table(),
            staging_dir: None,
            adjustment_batch_size: default_adjustment_batch_size(),
        }
    }
}

const fn default_max_workers() -> usize {
    2
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_transactional() -> bool {
    true
}

const fn default_retry_delay_ms() -> u64 {
    5000
}

const fn default_result_chunk_size() -> usize {
    1000
}

fn default_results_table() -> String {
    "experiment_results".into()
}

const fn default_adjustment_batch_size() -> usize {
    10_000
}

const STOP_REQUEST_TRIES: usize = 3;

/// Answer to [`JobExecutor::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Queued,
    /// The experiment is already queued or running; nothing new was started.
    AlreadyInFlight,
}

/// Answer to [`JobExecutor::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The experiment will never run (again); it is now `STOPPED`.
    Stopped,
    /// The running worker was signalled; it is now `STOPPING`.
    Stopping,
    /// Already in a terminal state; nothing changed.
    AlreadyFinished,
    NotFound,
}

/// What startup recovery did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub requeued: usize,
    pub stopped: usize,
    pub exhausted: usize,
}

/// What the worker asks the driving task to do after a run.
enum Next {
    Done,
    Retry(Duration),
}

struct Inner {
    config: ExecutorConfig,
    store: Arc<dyn ExperimentStore>,
    pipeline: Pipeline,
    permits: Arc<Semaphore>,
    registry: Registry,
    runtime: Handle,
}

/// Runs experiments on a bounded pool and owns their state transitions.
///
/// Cheap to clone; clones share the pool and the registry.
#[derive(Clone)]
pub struct JobExecutor {
    inner: Arc<Inner>,
}

impl JobExecutor {
    /// Build an executor whose tasks run on `runtime`.
    #[must_use]
    pub fn new(
        config: ExecutorConfig,
        engine: EngineConfig,
        store: Arc<dyn ExperimentStore>,
        catalog: Arc<dyn SourceCatalog>,
        runtime: Handle,
    ) -> Self {
        let staging_dir = config.staging_dir();
        let pipeline = Pipeline::new(
            catalog,
            DatasetPreparer::new(&staging_dir),
            CorrelationInvoker::new(engine, &staging_dir),
            config.adjustment_batch_size,
        );
        let permits = Arc::new(Semaphore::new(config.max_workers.max(1)));
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                pipeline,
                permits,
                registry: Registry::default(),
                runtime,
            }),
        }
    }

    /// Queue `id` for execution.
    ///
    /// A second submit while the first is queued or running is coalesced.
    pub fn submit(&self, id: ExperimentId) -> SubmitOutcome {
        let Some(ticket) = self.inner.registry.register(id) else {
            debug!(experiment_id = %id, "Experiment already in flight");
            return SubmitOutcome::AlreadyInFlight;
        };
        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(drive(inner, ticket));
        debug!(experiment_id = %id, "Experiment queued");
        SubmitOutcome::Queued
    }

    /// Request that `id` stops.
    ///
    /// Queued experiments are cancelled on the spot. Running ones are
    /// signalled and finish as `STOPPED` at their next checkpoint.
    ///
    /// # Errors
    /// Fails if the store cannot be read or written.
    pub fn stop(&self, id: ExperimentId) -> Result<StopOutcome> {
        let store = &self.inner.store;
        match self.inner.registry.cancel(id) {
            Some(Cancelled::Queued) => {
                store.transition_state(
                    id,
                    &[ExperimentState::WaitingForQueue, ExperimentState::Stopping],
                    ExperimentState::Stopped,
                )?;
                info!(experiment_id = %id, "Queued experiment stopped");
                Ok(StopOutcome::Stopped)
            }
            Some(Cancelled::Running) => {
                store.transition_state(
                    id,
                    &[ExperimentState::InProcess],
                    ExperimentState::Stopping,
                )?;
                info!(experiment_id = %id, "Stop signalled to running experiment");
                Ok(StopOutcome::Stopping)
            }
            None => {
                let Some(experiment) = store.get(id)? else {
                    return Ok(StopOutcome::NotFound);
                };
                if experiment.state.is_terminal() {
                    return Ok(StopOutcome::AlreadyFinished);
                }
                let changed = store.transition_state(
                    id,
                    &[
                        ExperimentState::WaitingForQueue,
                        ExperimentState::InProcess,
                        ExperimentState::Stopping,
                    ],
                    ExperimentState::Stopped,
                )?;
                if !changed {
                    return Ok(StopOutcome::AlreadyFinished);
                }
                info!(experiment_id = %id, "Idle experiment stopped");
                Ok(StopOutcome::Stopped)
            }
        }
    }

    /// Requeue experiments a previous process left unfinished.
    ///
    /// `STOPPING` becomes `STOPPED`; experiments at the attempt limit become
    /// `REACHED_ATTEMPTS_LIMIT`; the rest go back to `WAITING_FOR_QUEUE` and
    /// are submitted.
    ///
    /// # Errors
    /// Fails if pending experiments cannot be loaded or saved.
    pub fn recover_pending(&self) -> Result<RecoveryReport> {
        let mut report = RecoveryReport::default();
        for mut experiment in self.inner.store.pending()? {
            if self.inner.registry.contains(experiment.id) {
                continue;
            }
            match experiment.state {
                ExperimentState::Stopping => {
                    experiment.transition(ExperimentState::Stopped);
                    self.inner.store.save(&experiment)?;
                    report.stopped += 1;
                }
                _ if experiment.attempt >= self.inner.config.max_attempts => {
                    if experiment.state == ExperimentState::InProcess {
                        experiment.transition(ExperimentState::WaitingForQueue);
                    }
                    experiment.transition(ExperimentState::ReachedAttemptsLimit);
                    self.inner.store.save(&experiment)?;
                    warn!(
                        experiment_id = %experiment.id,
                        attempt = experiment.attempt,
                        "Experiment reached attempts limit"
                    );
                    report.exhausted += 1;
                }
                state => {
                    if state == ExperimentState::InProcess {
                        experiment.transition(ExperimentState::WaitingForQueue);
                        self.inner.store.save(&experiment)?;
                    }
                    self.submit(experiment.id);
                    report.requeued += 1;
                }
            }
        }
        info!(
            requeued = report.requeued,
            stopped = report.stopped,
            exhausted = report.exhausted,
            "Recovered pending experiments"
        );
        Ok(report)
    }

    /// Experiments queued or running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.registry.len()
    }

    #[must_use]
    pub fn is_in_flight(&self, id: ExperimentId) -> bool {
        self.inner.registry.contains(id)
    }

    #[must_use]
    pub fn is_running(&self, id: ExperimentId) -> bool {
        self.inner.registry.is_running(id)
    }

    /// Resolve once nothing is queued or running.
    pub async fn wait_idle(&self) {
        self.inner.registry.wait_idle().await;
    }
}

/// Stop request from a process that does not run the executor.
///
/// Queued experiments become `STOPPED`; running ones become `STOPPING` and
/// the owning executor finishes the stop when it next syncs with the store.
///
/// # Errors
/// Fails if the store cannot be read or written.
pub fn request_stop(store: &dyn ExperimentStore, id: ExperimentId) -> Result<StopOutcome> {
    // The worker may move the experiment between the read and the update.
    for _ in 0..STOP_REQUEST_TRIES {
        let Some(experiment) = store.get(id)? else {
            return Ok(StopOutcome::NotFound);
        };
        let (next, outcome) = match experiment.state {
            ExperimentState::WaitingForQueue => (ExperimentState::Stopped, StopOutcome::Stopped),
            ExperimentState::InProcess => (ExperimentState::Stopping, StopOutcome::Stopping),
            ExperimentState::Stopping => return Ok(StopOutcome::Stopping),
            _ => return Ok(StopOutcome::AlreadyFinished),
        };
        if store.transition_state(id, &[experiment.state], next)? {
            info!(experiment_id = %id, state = %next, "Stop requested");
            return Ok(outcome);
        }
    }
    Err(Error::Database(format!(
        "experiment {id} kept changing state while stopping"
    )))
}

/// Task owning one registry entry: wait for a permit, run, maybe retry.
async fn drive(inner: Arc<Inner>, ticket: Ticket) {
    let id = ticket.id;
    loop {
        let permit = tokio::select! {
            () = ticket.token.cancelled() => {
                debug!(experiment_id = %id, "Queued experiment dropped");
                return;
            }
            permit = Arc::clone(&inner.permits).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };
        if !inner.registry.start(&ticket) {
            return;
        }

        let worker = Arc::clone(&inner);
        let token = ticket.token.clone();
        let joined = tokio::task::spawn_blocking(move || worker.execute(id, &token)).await;
        drop(permit);

        let delay = match joined {
            Ok(Next::Done) => break,
            Ok(Next::Retry(delay)) => delay,
            Err(e) => {
                error!(experiment_id = %id, error = %e, "Experiment worker panicked");
                let worker = Arc::clone(&inner);
                if let Err(e) = tokio::task::spawn_blocking(move || worker.mark_failed(id)).await {
                    error!(experiment_id = %id, error = %e, "Failed to record worker panic");
                }
                break;
            }
        };

        if !inner.registry.requeue(&ticket) {
            break;
        }
        tokio::select! {
            () = ticket.token.cancelled() => return,
            () = tokio::time::sleep(delay) => {}
        }
    }
    inner.registry.release(&ticket);
}

impl Inner {
    /// Worker-thread body. Never fails: every outcome maps to a state.
    fn execute(&self, id: ExperimentId, token: &CancellationToken) -> Next {
        match self.pick_up(id) {
            Ok(Some(experiment)) => {
                let outcome = self
                    .pipeline
                    .run(&experiment, token)
                    .and_then(|outcome| checkpoint(token).map(|()| outcome));
                self.finish(experiment, outcome)
            }
            Ok(None) => Next::Done,
            Err(Error::StorageUnavailable(reason)) => {
                warn!(experiment_id = %id, reason = %reason, "Storage unavailable at pickup");
                Next::Retry(self.config.retry_delay())
            }
            Err(e) => {
                error!(experiment_id = %id, error = %e, "Failed to pick up experiment");
                Next::Done
            }
        }
    }

    /// Mark `id` as `IN_PROCESS` and bump its attempt counter.
    fn pick_up(&self, id: ExperimentId) -> Result<Option<Experiment>> {
        let Some(experiment) = self.store.claim(id)? else {
            match self.store.get(id)? {
                None => warn!(experiment_id = %id, "Submitted experiment does not exist"),
                Some(experiment) => {
                    debug!(experiment_id = %id, state = %experiment.state, "Skipping experiment");
                }
            }
            return Ok(None);
        };
        if self.config.commit_mode() == CommitMode::CompensatingDelete {
            let stale = self.store.delete_results(id)?;
            if stale > 0 {
                warn!(experiment_id = %id, rows = stale, "Deleted stale partial results");
            }
        }

        info!(
            experiment_id = %id,
            state = %experiment.state,
            attempt = experiment.attempt,
            "Experiment picked up"
        );
        Ok(Some(experiment))
    }

    fn finish(&self, experiment: Experiment, outcome: Result<CorrelationOutcome>) -> Next {
        match outcome {
            Ok(outcome) => self.complete(experiment, &outcome),
            Err(Error::NoSamplesInCommon) => {
                self.settle(experiment, ExperimentState::NoSamplesInCommon);
                Next::Done
            }
            Err(Error::Stopped) => {
                self.settle(experiment, ExperimentState::Stopped);
                Next::Done
            }
            Err(Error::StorageUnavailable(reason)) => self.retry_or_give_up(experiment, &reason),
            Err(e) => {
                error!(experiment_id = %experiment.id, error = %e, "Experiment failed");
                self.settle(experiment, ExperimentState::FinishedWithError);
                Next::Done
            }
        }
    }

    fn complete(&self, experiment: Experiment, outcome: &CorrelationOutcome) -> Next {
        let mut completed = experiment.clone();
        completed.evaluated_row_count = Some(outcome.evaluated_row_count);
        completed.result_total_row_count = Some(outcome.total_row_count);
        completed.result_final_row_count = Some(outcome.results.len() as u64);
        completed.transition(ExperimentState::Completed);

        match self
            .store
            .commit_results(&completed, &outcome.results, self.config.commit_mode())
        {
            Ok(()) => {
                info!(
                    experiment_id = %completed.id,
                    state = %completed.state,
                    rows = outcome.results.len(),
                    "Experiment completed"
                );
                Next::Done
            }
            Err(Error::StorageUnavailable(reason)) => self.retry_or_give_up(experiment, &reason),
            Err(e) => {
                error!(experiment_id = %experiment.id, error = %e, "Failed to persist results");
                self.settle(experiment, ExperimentState::FinishedWithError);
                Next::Done
            }
        }
    }

    fn retry_or_give_up(&self, mut experiment: Experiment, reason: &str) -> Next {
        if experiment.attempt >= self.config.max_attempts {
            warn!(
                experiment_id = %experiment.id,
                reason = %reason,
                "Storage unavailable, attempts exhausted"
            );
            experiment.transition(ExperimentState::WaitingForQueue);
            self.settle(experiment, ExperimentState::ReachedAttemptsLimit);
            return Next::Done;
        }

        warn!(
            experiment_id = %experiment.id,
            attempt = experiment.attempt,
            reason = %reason,
            "Storage unavailable, experiment requeued"
        );
        experiment.transition(ExperimentState::WaitingForQueue);
        if let Err(e) = self.store.save(&experiment) {
            warn!(experiment_id = %experiment.id, error = %e, "Could not record requeue");
        }
        Next::Retry(self.config.retry_delay())
    }

    /// Persist a final state, logging rather than failing.
    fn settle(&self, mut experiment: Experiment, state: ExperimentState) {
        experiment.transition(state);
        match self.store.save(&experiment) {
            Ok(()) => info!(
                experiment_id = %experiment.id,
                state = %experiment.state,
                attempt = experiment.attempt,
                "Experiment finished"
            ),
            Err(e) => error!(
                experiment_id = %experiment.id,
                state = %experiment.state,
                error = %e,
                "Failed to save experiment state"
            ),
        }
    }

    fn mark_failed(&self, id: ExperimentId) {
        match self.store.get(id) {
            Ok(Some(experiment)) if experiment.state == ExperimentState::InProcess => {
                self.settle(experiment, ExperimentState::FinishedWithError);
            }
            Ok(_) => {}
            Err(e) => error!(experiment_id = %id, error = %e, "Failed to load panicked experiment"),
        }
    }
}

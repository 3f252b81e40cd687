//! Persistence port for experiments and their results.

use crate::domain::experiment::{Experiment, ExperimentSpec, ExperimentState};
use crate::domain::id::ExperimentId;
use crate::domain::result::CorrelationResult;
use crate::error::Result;

/// How result rows are made visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMode {
    /// Results and the final experiment row are written in one transaction.
    Transactional,
    /// Results are written without a transaction; partial rows are deleted if
    /// any chunk fails. A crash between the insert and the delete leaves
    /// partial rows behind.
    CompensatingDelete,
}

impl CommitMode {
    #[must_use]
    pub const fn from_transactional(transactional: bool) -> Self {
        if transactional {
            Self::Transactional
        } else {
            Self::CompensatingDelete
        }
    }
}

/// Storage operations for experiments.
///
/// Implementations are blocking; the executor calls them from worker threads.
pub trait ExperimentStore: Send + Sync {
    /// Persist a new experiment in `WAITING_FOR_QUEUE`.
    fn insert(&self, spec: &ExperimentSpec) -> Result<Experiment>;

    /// Get an experiment by ID.
    fn get(&self, id: ExperimentId) -> Result<Option<Experiment>>;

    /// Write state, attempt and row counters of an existing experiment.
    fn save(&self, experiment: &Experiment) -> Result<()>;

    /// Set the state to `next` only if it currently is one of `from`.
    ///
    /// Returns whether the row changed.
    fn transition_state(
        &self,
        id: ExperimentId,
        from: &[ExperimentState],
        next: ExperimentState,
    ) -> Result<bool>;

    /// Move a `WAITING_FOR_QUEUE` or `IN_PROCESS` experiment to
    /// `IN_PROCESS` and bump its attempt counter in one conditional update.
    ///
    /// Returns the claimed experiment, or `None` when it does not exist or
    /// is in any other state.
    fn claim(&self, id: ExperimentId) -> Result<Option<Experiment>>;

    /// Experiments currently in any of `states`, oldest first.
    fn with_state(&self, states: &[ExperimentState]) -> Result<Vec<Experiment>>;

    /// Experiments that still need the engine's attention after a restart.
    fn pending(&self) -> Result<Vec<Experiment>> {
        self.with_state(&[
            ExperimentState::WaitingForQueue,
            ExperimentState::InProcess,
            ExperimentState::Stopping,
        ])
    }

    /// All experiments, newest first.
    fn list(&self) -> Result<Vec<Experiment>>;

    /// Number of persisted result rows.
    fn result_count(&self, id: ExperimentId) -> Result<u64>;

    /// Persisted result rows, strongest correlation first.
    fn results(&self, id: ExperimentId) -> Result<Vec<CorrelationResult>>;

    /// Delete every result row of an experiment. Returns count deleted.
    fn delete_results(&self, id: ExperimentId) -> Result<usize>;

    /// Write `results` and then `experiment`, all-or-nothing per `mode`.
    fn commit_results(
        &self,
        experiment: &Experiment,
        results: &[CorrelationResult],
        mode: CommitMode,
    ) -> Result<()>;
}

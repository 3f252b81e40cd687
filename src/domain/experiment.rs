//! Experiment (job) model and its state machine vocabulary.
//!
//! An [`Experiment`] references two primary sources and optionally a clinical
//! source, carries the analysis parameters and the counters the executor
//! writes back when a run finishes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::id::{ExperimentId, SourceRef};

/// Lifecycle state of an experiment.
///
/// Exactly one state holds at any time. Transitions are owned by the
/// executor; see [`ExperimentState::can_transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExperimentState {
    WaitingForQueue,
    InProcess,
    Completed,
    FinishedWithError,
    NoSamplesInCommon,
    Stopping,
    Stopped,
    ReachedAttemptsLimit,
}

impl ExperimentState {
    /// Stable literal used in the database and in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WaitingForQueue => "WAITING_FOR_QUEUE",
            Self::InProcess => "IN_PROCESS",
            Self::Completed => "COMPLETED",
            Self::FinishedWithError => "FINISHED_WITH_ERROR",
            Self::NoSamplesInCommon => "NO_SAMPLES_IN_COMMON",
            Self::Stopping => "STOPPING",
            Self::Stopped => "STOPPED",
            Self::ReachedAttemptsLimit => "REACHED_ATTEMPTS_LIMIT",
        }
    }

    /// States the engine never moves out of on its own.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed
                | Self::FinishedWithError
                | Self::NoSamplesInCommon
                | Self::Stopped
                | Self::ReachedAttemptsLimit
        )
    }

    /// States that still need a worker (startup recovery picks these up).
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::WaitingForQueue | Self::InProcess)
    }

    /// Whether the executor may move an experiment from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use ExperimentState::*;
        match (self, next) {
            (WaitingForQueue, InProcess | Stopping | Stopped | ReachedAttemptsLimit) => true,
            (
                InProcess,
                Completed | NoSamplesInCommon | FinishedWithError | WaitingForQueue | Stopping
                | Stopped,
            ) => true,
            (Stopping, Stopped) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ExperimentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExperimentState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let state = match s {
            "WAITING_FOR_QUEUE" => Self::WaitingForQueue,
            "IN_PROCESS" => Self::InProcess,
            "COMPLETED" => Self::Completed,
            "FINISHED_WITH_ERROR" => Self::FinishedWithError,
            "NO_SAMPLES_IN_COMMON" => Self::NoSamplesInCommon,
            "STOPPING" => Self::Stopping,
            "STOPPED" => Self::Stopped,
            "REACHED_ATTEMPTS_LIMIT" => Self::ReachedAttemptsLimit,
            other => {
                return Err(DomainError::UnknownVariant {
                    kind: "experiment state",
                    value: other.to_string(),
                })
            }
        };
        Ok(state)
    }
}

/// Molecule kind of dataset B. Dataset A is always gene expression.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentKind {
    #[default]
    Mirna,
    Cna,
    Methylation,
}

/// Correlation statistic computed by the external engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationMethod {
    #[default]
    Pearson,
    Spearman,
    Kendall,
}

/// Multiple-testing correction applied to raw p-values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentMethod {
    #[default]
    BenjaminiHochberg,
    BenjaminiYekutieli,
    Bonferroni,
}

macro_rules! literal_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $lit:literal),+ $(,)? }) => {
        impl $ty {
            /// Stable literal used in the database and on the engine command line.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $lit,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($lit => Ok(Self::$variant),)+
                    other => Err(DomainError::UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

literal_enum!(ExperimentKind, "experiment kind", {
    Mirna => "mirna",
    Cna => "cna",
    Methylation => "methylation",
});

literal_enum!(CorrelationMethod, "correlation method", {
    Pearson => "pearson",
    Spearman => "spearman",
    Kendall => "kendall",
});

literal_enum!(AdjustmentMethod, "adjustment method", {
    BenjaminiHochberg => "benjamini_hochberg",
    BenjaminiYekutieli => "benjamini_yekutieli",
    Bonferroni => "bonferroni",
});

/// Parameters supplied at submission time.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentSpec {
    pub name: String,
    pub kind: ExperimentKind,
    pub source_a: SourceRef,
    pub source_b: SourceRef,
    pub clinical_source: Option<SourceRef>,
    /// CpG-site → gene lookup; only meaningful for methylation experiments.
    pub cpg_platform: Option<SourceRef>,
    pub correlation_method: CorrelationMethod,
    pub adjustment_method: AdjustmentMethod,
    /// Minimum absolute correlation a pair needs to be reported.
    pub min_correlation: f64,
    pub min_std_dev_a: f64,
    pub min_std_dev_b: f64,
    pub all_vs_all: bool,
    /// Keep only the top-N pairs by absolute correlation.
    pub result_limit: Option<usize>,
}

impl ExperimentSpec {
    /// Check thresholds before an experiment is stored.
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidThreshold`] for negative or non-finite values,
    /// or a correlation threshold above 1.
    pub fn validate(&self) -> Result<(), DomainError> {
        let checks = [
            ("min_correlation", self.min_correlation),
            ("min_std_dev_a", self.min_std_dev_a),
            ("min_std_dev_b", self.min_std_dev_b),
        ];
        for (field, value) in checks {
            if !value.is_finite() || value < 0.0 {
                return Err(DomainError::InvalidThreshold { field, value });
            }
        }
        if self.min_correlation > 1.0 {
            return Err(DomainError::InvalidThreshold {
                field: "min_correlation",
                value: self.min_correlation,
            });
        }
        Ok(())
    }
}

/// One submitted analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct Experiment {
    pub id: ExperimentId,
    pub spec: ExperimentSpec,
    pub state: ExperimentState,
    /// Incremented once per worker pickup.
    pub attempt: u32,
    /// Pairs evaluated by the engine, before threshold and truncation.
    pub evaluated_row_count: Option<u64>,
    /// Pairs that passed the threshold, before truncation.
    pub result_total_row_count: Option<u64>,
    /// Rows actually persisted.
    pub result_final_row_count: Option<u64>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Experiment {
    /// True when dataset B holds CpG sites that are remapped to genes.
    #[must_use]
    pub fn is_cpg_analysis(&self) -> bool {
        self.spec.kind == ExperimentKind::Methylation && self.spec.cpg_platform.is_some()
    }

    /// Move to `next`, stamping `updated_at`.
    ///
    /// Illegal transitions are logged and applied anyway; the executor is the
    /// only caller and its own rules are stricter than this table.
    pub fn transition(&mut self, next: ExperimentState) {
        if !self.state.can_transition_to(next) {
            tracing::warn!(
                experiment_id = %self.id,
                from = %self.state,
                to = %next,
                "Unexpected experiment state transition"
            );
        }
        self.state = next;
        self.updated_at = Utc::now();
    }

    /// Primary sources followed by the clinical source, if any.
    #[must_use]
    pub fn sources(&self) -> Vec<&SourceRef> {
        let mut sources = vec![&self.spec.source_a, &self.spec.source_b];
        if let Some(clinical) = &self.spec.clinical_source {
            sources.push(clinical);
        }
        sources
    }
}

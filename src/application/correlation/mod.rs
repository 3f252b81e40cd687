//! External correlation engine invocation.

pub mod invoker;
pub mod output;

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::experiment::{AdjustmentMethod, CorrelationMethod};

pub use invoker::CorrelationInvoker;

/// How to launch and supervise the correlation engine.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Engine executable.
    #[serde(default = "default_program")]
    pub program: String,
    /// Arguments placed before the generated ones.
    #[serde(default)]
    pub args: Vec<String>,
    /// Interval between completion and cancellation checks.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Dataset B is loaded in memory when its staged file is at most this
    /// large. Zero leaves the choice to the engine.
    #[serde(default = "default_in_memory_threshold_bytes")]
    pub in_memory_threshold_bytes: u64,
    #[serde(default = "default_sort_buffer_size")]
    pub sort_buffer_size: usize,
    /// Whether the engine adjusts p-values itself. When false the executor
    /// runs the streaming adjustment on the raw results.
    #[serde(default = "default_adjusts_p_values")]
    pub adjusts_p_values: bool,
}

impl EngineConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn in_memory_threshold(&self) -> Option<u64> {
        (self.in_memory_threshold_bytes > 0).then_some(self.in_memory_threshold_bytes)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
            poll_interval_ms: default_poll_interval_ms(),
            in_memory_threshold_bytes: default_in_memory_threshold_bytes(),
            sort_buffer_size: default_sort_buffer_size(),
            adjusts_p_values: default_adjusts_p_values(),
        }
    }
}

fn default_program() -> String {
    "omicorr-engine".into()
}

const fn default_poll_interval_ms() -> u64 {
    1000
}

const fn default_in_memory_threshold_bytes() -> u64 {
    512 * 1024 * 1024
}

const fn default_sort_buffer_size() -> usize {
    2_000_000
}

const fn default_adjusts_p_values() -> bool {
    true
}

/// One engine run over two staged datasets.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationRequest<'a> {
    pub dataset_a: &'a Path,
    pub dataset_b: &'a Path,
    pub method: CorrelationMethod,
    /// Minimum absolute correlation.
    pub threshold: f64,
    /// `None` asks the engine for raw p-values.
    pub adjustment: Option<AdjustmentMethod>,
    pub all_vs_all: bool,
    /// Dataset B was CpG-mapped; results carry the site to reattach.
    pub is_cpg_analysis: bool,
    pub keep_top_n: Option<usize>,
}

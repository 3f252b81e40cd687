//! Supervised engine subprocess.
//!
//! The engine runs in its own process so it can be killed outright; the
//! calling worker thread polls for completion and re-checks the
//! cancellation token on every iteration.

use std::ffi::OsString;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};

use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::output::{read_results, read_summary};
use super::{CorrelationRequest, EngineConfig};
use crate::application::checkpoint;
use crate::domain::result::CorrelationOutcome;
use crate::error::{Error, Result};

const STDERR_TAIL_BYTES: usize = 2048;

/// Launches the correlation engine and collects its output.
#[derive(Debug, Clone)]
pub struct CorrelationInvoker {
    config: EngineConfig,
    scratch_dir: PathBuf,
}

impl CorrelationInvoker {
    /// Engine output files are created under `scratch_dir`.
    #[must_use]
    pub fn new(config: EngineConfig, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            scratch_dir: scratch_dir.into(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run the engine over two staged datasets.
    ///
    /// Staging files are left untouched; the caller owns them.
    ///
    /// # Errors
    /// [`Error::Stopped`] when `token` is cancelled (the process is killed
    /// first), [`Error::Failed`] for launch failures, non-zero exits and
    /// unreadable output.
    pub fn run(
        &self,
        request: &CorrelationRequest<'_>,
        token: &CancellationToken,
    ) -> Result<CorrelationOutcome> {
        checkpoint(token)?;
        let gem_in_memory = self.collect_in_memory(request.dataset_b)?;

        let output = self.scratch_file("omicorr-result-", ".tsv")?;
        let summary = self.scratch_file("omicorr-summary-", ".json")?;
        let stderr = self.scratch_file("omicorr-engine-", ".log")?;

        let args = self.arguments(request, gem_in_memory, output.path(), summary.path());
        let child = self.spawn(&args, stderr.reopen()?)?;
        debug!(program = %self.config.program, pid = child.id(), "Correlation engine started");

        let status = self.supervise(child, token)?;
        if !status.success() {
            return Err(Error::Failed(format!(
                "{} exited with {status}: {}",
                self.config.program,
                stderr_tail(stderr.path())
            )));
        }

        let results = read_results(output.path(), request.is_cpg_analysis)
            .map_err(|e| Error::Failed(format!("unreadable engine results: {e}")))?;
        let counts = read_summary(summary.path())
            .map_err(|e| Error::Failed(format!("unreadable engine summary: {e}")))?;

        let mut outcome = CorrelationOutcome {
            results,
            total_row_count: counts.total_row_count,
            evaluated_row_count: counts.evaluated_row_count,
        };
        outcome.truncate_top(request.keep_top_n);

        info!(
            rows = outcome.results.len(),
            total = outcome.total_row_count,
            evaluated = outcome.evaluated_row_count,
            "Correlation engine finished"
        );
        Ok(outcome)
    }

    /// `None` defers the in-memory decision to the engine.
    fn collect_in_memory(&self, dataset_b: &Path) -> Result<Option<bool>> {
        match self.config.in_memory_threshold() {
            None => Ok(None),
            Some(threshold) => Ok(Some(std::fs::metadata(dataset_b)?.len() <= threshold)),
        }
    }

    fn scratch_file(&self, prefix: &str, suffix: &str) -> Result<NamedTempFile> {
        Ok(tempfile::Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .tempfile_in(&self.scratch_dir)?)
    }

    fn arguments(
        &self,
        request: &CorrelationRequest<'_>,
        gem_in_memory: Option<bool>,
        output: &Path,
        summary: &Path,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.config.args.iter().map(OsString::from).collect();
        let mut push = |flag: &str, value: OsString| {
            args.push(flag.into());
            args.push(value);
        };

        push("--dataset-a", request.dataset_a.into());
        push("--dataset-b", request.dataset_b.into());
        push("--method", request.method.as_str().into());
        push("--threshold", request.threshold.to_string().into());
        push(
            "--adjustment",
            request.adjustment.map_or("none", |m| m.as_str()).into(),
        );
        if let Some(n) = request.keep_top_n {
            push("--keep-top-n", n.to_string().into());
        }
        push("--sort-buffer-size", self.config.sort_buffer_size.to_string().into());
        if let Some(in_memory) = gem_in_memory {
            push("--gem-in-memory", in_memory.to_string().into());
        }
        push("--output", output.into());
        push("--summary", summary.into());

        if request.all_vs_all {
            args.push("--all-vs-all".into());
        }
        if request.is_cpg_analysis {
            args.push("--cpg".into());
        }
        args
    }

    fn spawn(&self, args: &[OsString], stderr: File) -> Result<Child> {
        Command::new(&self.config.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|e| {
                let reason = if e.kind() == ErrorKind::NotFound {
                    "executable not found".to_string()
                } else {
                    e.to_string()
                };
                Error::Failed(format!("could not launch {}: {reason}", self.config.program))
            })
    }

    /// Wait for `child`, killing it as soon as `token` is cancelled.
    fn supervise(&self, mut child: Child, token: &CancellationToken) -> Result<ExitStatus> {
        let poll_interval = self.config.poll_interval();
        loop {
            if token.is_cancelled() {
                terminate(&mut child);
                return Err(Error::Stopped);
            }
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => std::thread::sleep(poll_interval),
                Err(e) => {
                    terminate(&mut child);
                    return Err(Error::Failed(format!("lost track of engine process: {e}")));
                }
            }
        }
    }
}

fn terminate(child: &mut Child) {
    let pid = child.id();
    if let Err(e) = child.kill() {
        warn!(pid, error = %e, "Failed to kill correlation engine");
    }
    if let Err(e) = child.wait() {
        warn!(pid, error = %e, "Failed to reap correlation engine");
    }
    info!(pid, "Correlation engine terminated");
}

fn stderr_tail(path: &Path) -> String {
    let content = std::fs::read_to_string(path).unwrap_or_default();
    let trimmed = content.trim();
    let start = trimmed.len().saturating_sub(STDERR_TAIL_BYTES);
    let start = (start..trimmed.len())
        .find(|&i| trimmed.is_char_boundary(i))
        .unwrap_or(trimmed.len());
    if trimmed.is_empty() {
        "no diagnostics".to_string()
    } else {
        trimmed[start..].to_string()
    }
}

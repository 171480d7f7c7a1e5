//! Fan-out of granules over a fixed-size worker pool.
//!
//! Every window becomes one task on a rayon pool; each task runs its
//! granule start to finish and sends the outcome back over a channel.
//! Granules share nothing but the output directory.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Instant;

use cfradial::RadarIo;
use metrics::{counter, histogram};
use tracing::{info, warn};

use crate::config::AssemblyConfig;
use crate::error::{AssemblyError, FailureKind, Result};
use crate::granule::{process_window, GranuleOutcome};
use crate::indexer::{TruncatedWindow, VolumeWindow, WindowIndex};

/// How granules are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One task per window on a pool of `workers` threads.
    Parallel { workers: usize },
    /// Every window on the calling thread, in window order.
    Serial,
}

impl ExecutionMode {
    /// Parallel mode sized from the config, or the available parallelism.
    pub fn from_config(config: &AssemblyConfig) -> Self {
        let workers = config.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        Self::Parallel { workers }
    }
}

/// Outcomes of one batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// One per processed window, sorted by window id
    pub outcomes: Vec<GranuleOutcome>,
    /// Windows dropped before processing
    pub skipped: Vec<TruncatedWindow>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Output paths of successful granules, in window order.
    pub fn outputs(&self) -> Vec<&Path> {
        self.outcomes.iter().filter_map(|o| o.output()).collect()
    }

    pub fn failures_of(&self, kind: FailureKind) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.failure_kind() == Some(kind))
            .count()
    }
}

/// Runs the assembly pipeline for a set of windows.
pub struct Orchestrator {
    io: Arc<dyn RadarIo>,
    config: AssemblyConfig,
    output_dir: PathBuf,
}

impl Orchestrator {
    pub fn new(io: Arc<dyn RadarIo>, config: AssemblyConfig, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            io,
            config,
            output_dir: output_dir.into(),
        }
    }

    /// Process every window of `index` and gather the outcomes.
    ///
    /// Fails only if the worker pool cannot be built; granule failures are
    /// reported in the returned [`BatchReport`].
    pub fn run(&self, index: &WindowIndex, mode: ExecutionMode) -> Result<BatchReport> {
        let started = Instant::now();

        for skipped in &index.truncated {
            let err = AssemblyError::WindowSizeMismatch {
                expected: self.config.tilts,
                found: skipped.available,
            };
            warn!(
                window = skipped.id,
                base_scan = %skipped.base_scan.display(),
                kind = %err.kind(),
                error = %err,
                "Skipping window"
            );
            counter!("glue_granules_total", "outcome" => err.kind().as_str()).increment(1);
        }

        let mut outcomes: Vec<GranuleOutcome> = match mode {
            ExecutionMode::Serial => index
                .windows
                .iter()
                .map(|window| self.process(window))
                .collect(),
            ExecutionMode::Parallel { workers } => self.run_pool(index, workers)?,
        };
        outcomes.sort_by_key(|o| o.window_id);

        let report = BatchReport {
            outcomes,
            skipped: index.truncated.clone(),
        };

        info!(
            windows = index.windows.len(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            skipped = report.skipped.len(),
            mode = ?mode,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch complete"
        );

        Ok(report)
    }

    fn run_pool(&self, index: &WindowIndex, workers: usize) -> Result<Vec<GranuleOutcome>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("glue-worker-{}", i))
            .build()
            .map_err(|e| AssemblyError::InvalidConfig(format!("worker pool: {}", e)))?;

        let (tx, rx) = mpsc::channel();
        pool.scope(|scope| {
            for window in &index.windows {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let outcome = self.process(window);
                    // The receiver outlives the scope.
                    let _ = tx.send(outcome);
                });
            }
        });
        drop(tx);

        Ok(rx.into_iter().collect())
    }

    fn process(&self, window: &VolumeWindow) -> GranuleOutcome {
        let outcome = process_window(self.io.as_ref(), window, &self.config, &self.output_dir);

        let label = match outcome.failure_kind() {
            None => "success",
            Some(kind) => kind.as_str(),
        };
        counter!("glue_granules_total", "outcome" => label).increment(1);
        histogram!("glue_granule_duration_seconds").record(outcome.elapsed.as_secs_f64());

        outcome
    }
}

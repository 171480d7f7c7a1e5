//! One window's read, merge, correct and commit cycle.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use cfradial::RadarIo;
use tracing::{debug, error, info, warn};

use crate::assembler::{merge_sweeps, read_window};
use crate::committer::commit;
use crate::config::AssemblyConfig;
use crate::corrector::correct;
use crate::error::{AssemblyError, FailureKind};
use crate::indexer::VolumeWindow;

/// Lifecycle of a granule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GranuleState {
    Pending,
    Reading,
    Merging,
    Correcting,
    Committing,
    Done,
    Failed,
}

impl GranuleState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: GranuleState) -> bool {
        use GranuleState::*;
        matches!(
            (self, next),
            (Pending, Reading)
                | (Reading, Merging)
                | (Merging, Correcting)
                | (Correcting, Committing)
                | (Committing, Done)
                | (Reading | Merging | Correcting | Committing, Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Reading => "reading",
            Self::Merging => "merging",
            Self::Correcting => "correcting",
            Self::Committing => "committing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for GranuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of processing one window.
#[derive(Debug)]
pub struct GranuleOutcome {
    /// Window identity (ordinal of the base scan)
    pub window_id: usize,
    pub base_scan: PathBuf,
    /// Output path on success
    pub result: Result<PathBuf, AssemblyError>,
    pub final_state: GranuleState,
    /// State the granule was in when it failed
    pub failed_in: Option<GranuleState>,
    pub elapsed: Duration,
}

impl GranuleOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn output(&self) -> Option<&Path> {
        self.result.as_ref().ok().map(PathBuf::as_path)
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.result.as_ref().err().map(AssemblyError::kind)
    }
}

struct Granule<'a> {
    window: &'a VolumeWindow,
    state: GranuleState,
    started: Instant,
}

impl<'a> Granule<'a> {
    fn new(window: &'a VolumeWindow) -> Self {
        Self {
            window,
            state: GranuleState::Pending,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, next: GranuleState) {
        if !self.state.can_advance_to(next) {
            error!(
                window = self.window.id,
                from = %self.state,
                to = %next,
                "Illegal granule transition"
            );
            debug_assert!(false, "illegal transition {} -> {}", self.state, next);
        }
        debug!(window = self.window.id, from = %self.state, to = %next, "Granule transition");
        self.state = next;
    }

    fn finish(mut self, result: Result<PathBuf, AssemblyError>) -> GranuleOutcome {
        let failed_in = match result {
            Ok(_) => {
                self.advance(GranuleState::Done);
                None
            }
            Err(_) => {
                let from = self.state;
                self.advance(GranuleState::Failed);
                Some(from)
            }
        };

        GranuleOutcome {
            window_id: self.window.id,
            base_scan: self.window.base_scan().to_path_buf(),
            result,
            final_state: self.state,
            failed_in,
            elapsed: self.started.elapsed(),
        }
    }
}

/// Run the full pipeline for one window and report the outcome.
///
/// Never panics; every failure, including a panic inside a stage, becomes
/// a failed outcome.
pub fn process_window(
    io: &dyn RadarIo,
    window: &VolumeWindow,
    config: &AssemblyConfig,
    output_dir: &Path,
) -> GranuleOutcome {
    let mut granule = Granule::new(window);
    // A panic is contained here so that sibling granules and the batch
    // report survive it. Stages advance out of Pending before doing any
    // work, so the granule can always move to Failed afterwards.
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        run_stages(&mut granule, io, config, output_dir)
    }))
    .unwrap_or_else(|payload| Err(AssemblyError::Aborted(panic_message(payload.as_ref()))));
    let outcome = granule.finish(result);
    log_outcome(&outcome);
    outcome
}

fn run_stages(
    granule: &mut Granule<'_>,
    io: &dyn RadarIo,
    config: &AssemblyConfig,
    output_dir: &Path,
) -> Result<PathBuf, AssemblyError> {
    let window = granule.window;

    granule.advance(GranuleState::Reading);
    if window.len() != config.tilts {
        return Err(AssemblyError::WindowSizeMismatch {
            expected: config.tilts,
            found: window.len(),
        });
    }
    let sweeps = read_window(io, window)?;

    granule.advance(GranuleState::Merging);
    let assembled = merge_sweeps(io, window, sweeps)?;

    granule.advance(GranuleState::Correcting);
    let (volume, _report) = correct(assembled, config)?;

    granule.advance(GranuleState::Committing);
    commit(io, output_dir, &config.naming, &volume)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {}", msg)
    } else {
        "panicked".to_string()
    }
}

fn log_outcome(outcome: &GranuleOutcome) {
    let elapsed_ms = outcome.elapsed.as_millis() as u64;
    match &outcome.result {
        Ok(path) => info!(
            window = outcome.window_id,
            base_scan = %outcome.base_scan.display(),
            output = %path.display(),
            elapsed_ms = elapsed_ms,
            "Granule complete"
        ),
        Err(e) => warn!(
            window = outcome.window_id,
            base_scan = %outcome.base_scan.display(),
            kind = %e.kind(),
            failed_in = ?outcome.failed_in,
            error = %e,
            elapsed_ms = elapsed_ms,
            "Granule failed"
        ),
    }
}

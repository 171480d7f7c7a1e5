//! Radar sweep-to-volume assembly.
//!
//! Reconstructs complete volume scans from a directory of single-elevation
//! sweep files written by a continuously rotating radar.
//!
//! # Pipeline
//!
//! - [`indexer`] lists one directory snapshot and groups sweeps into
//!   fixed-size windows, each starting at a base scan
//! - [`assembler`] reads a window and folds its sweeps into one volume
//! - [`corrector`] repairs known post-merge metadata defects
//! - [`committer`] names the volume from its start time and publishes it
//!   atomically
//! - [`orchestrator`] runs one granule per window on a worker pool
//!
//! Each granule either produces exactly one output file or none; a failing
//! granule never affects its siblings.

pub mod assembler;
pub mod committer;
pub mod config;
pub mod corrector;
pub mod error;
pub mod granule;
pub mod indexer;
pub mod orchestrator;

use std::path::Path;
use std::sync::Arc;

use cfradial::RadarIo;

// Re-exports
pub use assembler::{assemble, AssembledVolume};
pub use committer::{commit, output_file_name, volume_timestamp};
pub use config::{AssemblyConfig, FillPolicy, OutputNaming};
pub use corrector::{correct, CorrectionReport};
pub use error::{AssemblyError, FailureKind, Result};
pub use granule::{process_window, GranuleOutcome, GranuleState};
pub use indexer::{index_directory, SweepFile, TruncatedWindow, VolumeWindow, WindowIndex};
pub use orchestrator::{BatchReport, ExecutionMode, Orchestrator};

/// Index `input_dir` and assemble every complete window into `output_dir`.
pub fn assemble_directory(
    io: Arc<dyn RadarIo>,
    input_dir: &Path,
    output_dir: &Path,
    config: &AssemblyConfig,
    name_prefix: Option<&str>,
    mode: ExecutionMode,
) -> Result<BatchReport> {
    config.validate().map_err(AssemblyError::InvalidConfig)?;

    let index = index_directory(input_dir, config, name_prefix)?;
    Orchestrator::new(io, config.clone(), output_dir).run(&index, mode)
}

//! Window read and merge.

use cfradial::{RadarIo, RadarVolume};
use tracing::debug;

use crate::error::{AssemblyError, Result};
use crate::indexer::VolumeWindow;

/// A merged volume plus what the corrector needs from the base scan.
#[derive(Debug, Clone)]
pub struct AssembledVolume {
    pub volume: RadarVolume,
    /// Sweep mode recorded in the base scan file
    pub base_sweep_mode: Option<String>,
}

/// Read every sweep of a window, in order.
///
/// Any single failure voids the window.
pub fn read_window(io: &dyn RadarIo, window: &VolumeWindow) -> Result<Vec<RadarVolume>> {
    window
        .sweeps
        .iter()
        .map(|sweep| {
            io.read(&sweep.path).map_err(|source| AssemblyError::Read {
                path: sweep.path.clone(),
                source,
            })
        })
        .collect()
}

/// Fold the sweeps into one volume, the first sweep as seed.
///
/// Each sweep is consumed by the join, so per-file objects are released
/// as soon as they are merged.
pub fn merge_sweeps(
    io: &dyn RadarIo,
    window: &VolumeWindow,
    sweeps: Vec<RadarVolume>,
) -> Result<AssembledVolume> {
    if sweeps.len() != window.len() || sweeps.is_empty() {
        return Err(AssemblyError::WindowSizeMismatch {
            expected: window.len(),
            found: sweeps.len(),
        });
    }

    let mut sweeps = sweeps.into_iter().zip(&window.sweeps);
    let (seed, _) = sweeps.next().ok_or(AssemblyError::WindowSizeMismatch {
        expected: window.len(),
        found: 0,
    })?;
    let base_sweep_mode = seed.sweeps.sweep_mode.first().cloned();

    let volume = sweeps.try_fold(seed, |merged, (sweep, file)| {
        io.join(merged, sweep).map_err(|source| AssemblyError::Merge {
            path: file.path.clone(),
            source,
        })
    })?;

    debug!(
        window = window.id,
        sweeps = volume.nsweeps(),
        rays = volume.nrays(),
        "Merged window"
    );

    Ok(AssembledVolume {
        volume,
        base_sweep_mode,
    })
}

/// Read and merge a window.
pub fn assemble(io: &dyn RadarIo, window: &VolumeWindow) -> Result<AssembledVolume> {
    let sweeps = read_window(io, window)?;
    merge_sweeps(io, window, sweeps)
}

//! Output naming and atomic publication.

use std::path::{Path, PathBuf};

use cfradial::{RadarIo, RadarVolume};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::OutputNaming;
use crate::error::{AssemblyError, Result};

/// Canonical output time: time start plus the first ray offset, whole seconds.
pub fn volume_timestamp(volume: &RadarVolume) -> Result<DateTime<Utc>> {
    let Some(first) = volume.time.data.first() else {
        return Err(AssemblyError::MalformedVolume("volume has no rays".to_string()));
    };
    volume.time.first_ray_time().ok_or_else(|| {
        AssemblyError::MalformedVolume(format!("first ray offset {} out of range", first))
    })
}

/// `<prefix>_volume_%Y%m%d-%H%M%S.<qualifier>.nc`
pub fn output_file_name(naming: &OutputNaming, timestamp: DateTime<Utc>) -> String {
    format!(
        "{}_volume_{}.{}.nc",
        naming.prefix,
        timestamp.format("%Y%m%d-%H%M%S"),
        naming.qualifier
    )
}

/// Final output path for a corrected volume.
pub fn output_path(
    output_dir: &Path,
    naming: &OutputNaming,
    volume: &RadarVolume,
) -> Result<PathBuf> {
    Ok(output_dir.join(output_file_name(naming, volume_timestamp(volume)?)))
}

/// Write `volume` next to its final path and rename it into place.
///
/// Readers of the final path see either the previous file or the complete
/// new one. An existing file is replaced. On failure the temporary file is
/// removed and the final path is untouched.
pub fn commit(
    io: &dyn RadarIo,
    output_dir: &Path,
    naming: &OutputNaming,
    volume: &RadarVolume,
) -> Result<PathBuf> {
    let destination = output_path(output_dir, naming, volume)?;

    std::fs::create_dir_all(output_dir).map_err(|source| AssemblyError::Commit {
        path: destination.clone(),
        source,
    })?;

    // Same directory as the destination so the rename stays on one filesystem.
    let temp = tempfile::Builder::new()
        .prefix(".glue-")
        .suffix(".nc.tmp")
        .tempfile_in(output_dir)
        .map_err(|source| AssemblyError::Commit {
            path: destination.clone(),
            source,
        })?;

    io.write(temp.path(), volume)
        .map_err(|source| AssemblyError::Write {
            path: destination.clone(),
            source,
        })?;

    temp.persist(&destination)
        .map_err(|e| AssemblyError::Commit {
            path: destination.clone(),
            source: e.error,
        })?;

    debug!(path = %destination.display(), "Committed volume");
    Ok(destination)
}

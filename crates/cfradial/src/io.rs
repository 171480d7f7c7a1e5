//! Radar object I/O seam.

use std::path::Path;

use crate::error::RadarResult;
use crate::join::join_radar;
use crate::volume::RadarVolume;

/// Read, write and join radar volumes.
///
/// Implementations must be usable from several worker threads at once.
pub trait RadarIo: Send + Sync {
    /// Read one sweep file.
    fn read(&self, path: &Path) -> RadarResult<RadarVolume>;

    /// Write a volume to `path`, replacing any existing file.
    fn write(&self, path: &Path, volume: &RadarVolume) -> RadarResult<()>;

    /// Append the sweeps of `b` to `a`.
    fn join(&self, a: RadarVolume, b: RadarVolume) -> RadarResult<RadarVolume> {
        join_radar(a, b)
    }
}

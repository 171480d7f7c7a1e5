//! Sweep directory fixtures.
//!
//! [`SweepDirBuilder`] lays out a scratch directory the way the radar's
//! ingest directory looks: one file per tilt, named by datastream, sweep
//! start time and tilt number, written with [`JsonRadarIo`].

use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use cfradial::RadarIo;
use chrono::{DateTime, Utc};
use tempfile::TempDir;

use crate::generators::{synthetic_sweep_at, tilt_start};
use crate::io::JsonRadarIo;

/// Datastream prefix of every fixture sweep file.
pub const DATASTREAM: &str = "gucxprecipradarS2.00";

/// Default sweep geometry.
pub const DEFAULT_NRAYS: usize = 12;
pub const DEFAULT_NGATES: usize = 5;

/// File name of tilt `tilt` (1-based) of the volume starting at `volume_start`.
///
/// ```
/// use test_utils::{reference_start, sweep_file_name};
///
/// assert_eq!(
///     sweep_file_name(reference_start(), 2),
///     "gucxprecipradarS2.00.20220301.000025.raw.csu.sail-20220301-000025_2_PPI.nc"
/// );
/// ```
pub fn sweep_file_name(volume_start: DateTime<Utc>, tilt: usize) -> String {
    let start = tilt_start(volume_start, tilt.saturating_sub(1));
    format!(
        "{}.{}.raw.csu.sail-{}_{}_PPI.nc",
        DATASTREAM,
        start.format("%Y%m%d.%H%M%S"),
        start.format("%Y%m%d-%H%M%S"),
        tilt
    )
}

/// Builds a scratch directory of sweep files.
pub struct SweepDirBuilder {
    dir: TempDir,
    nrays: usize,
    ngates: usize,
}

impl Default for SweepDirBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SweepDirBuilder {
    pub fn new() -> Self {
        Self {
            dir: tempfile::Builder::new()
                .prefix("sweeps_")
                .tempdir()
                .expect("Failed to create sweep directory"),
            nrays: DEFAULT_NRAYS,
            ngates: DEFAULT_NGATES,
        }
    }

    /// Rays and gates of every sweep written after this call.
    pub fn geometry(mut self, nrays: usize, ngates: usize) -> Self {
        self.nrays = nrays;
        self.ngates = ngates;
        self
    }

    /// Write tilts `1..=tilts` of a volume starting at `volume_start`.
    pub fn volume(self, volume_start: DateTime<Utc>, tilts: usize) -> Self {
        self.sweeps(volume_start, 1..=tilts)
    }

    /// Write the given 1-based tilts of a volume starting at `volume_start`.
    pub fn sweeps(self, volume_start: DateTime<Utc>, tilts: RangeInclusive<usize>) -> Self {
        for tilt in tilts {
            let sweep = synthetic_sweep_at(volume_start, tilt - 1, self.nrays, self.ngates);
            let path = self.dir.path().join(sweep_file_name(volume_start, tilt));
            JsonRadarIo
                .write(&path, &sweep)
                .expect("Failed to write fixture sweep");
        }
        self
    }

    /// Write an arbitrary file, e.g. an RHI scan or a stray text file.
    pub fn file(self, name: &str, contents: &[u8]) -> Self {
        fs::write(self.dir.path().join(name), contents).expect("Failed to write fixture file");
        self
    }

    pub fn build(self) -> SweepDir {
        SweepDir { dir: self.dir }
    }
}

/// A populated scratch directory, removed on drop.
pub struct SweepDir {
    dir: TempDir,
}

impl SweepDir {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Sweep files (`*_PPI.nc`) in sorted order.
    pub fn sweep_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = fs::read_dir(self.dir.path())
            .expect("Failed to list sweep directory")
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.ends_with("_PPI.nc"))
                    .unwrap_or(false)
            })
            .collect();
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        files
    }

    /// Overwrite the sweep at `ordinal` (sorted position) with garbage.
    pub fn corrupt(&self, ordinal: usize) -> PathBuf {
        let path = self.sweep_files()[ordinal].clone();
        fs::write(&path, b"CDF\x01 truncated").expect("Failed to corrupt sweep");
        path
    }

    /// Remove the sweep at `ordinal` (sorted position).
    pub fn remove(&self, ordinal: usize) -> PathBuf {
        let path = self.sweep_files()[ordinal].clone();
        fs::remove_file(&path).expect("Failed to remove sweep");
        path
    }
}

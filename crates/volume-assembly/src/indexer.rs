//! Sweep file classification and volume windowing.
//!
//! A directory snapshot is listed once, every sweep file is turned into an
//! explicit [`SweepFile`] record, and each base scan opens a window over
//! the next `tilts` sweeps of the sorted listing.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::AssemblyConfig;
use crate::error::{AssemblyError, Result};

/// One elevation scan file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepFile {
    pub path: PathBuf,
    /// Position in the sorted sweep listing
    pub ordinal: usize,
    /// Tilt number parsed from the file name, if present
    pub tilt: Option<u32>,
    pub is_base_scan: bool,
}

/// A run of consecutive sweeps starting at a base scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeWindow {
    /// Ordinal of the base scan
    pub id: usize,
    pub sweeps: Vec<SweepFile>,
}

impl VolumeWindow {
    pub fn base_scan(&self) -> &Path {
        // Windows are only built with at least one sweep.
        self.sweeps
            .first()
            .map(|s| s.path.as_path())
            .unwrap_or_else(|| Path::new(""))
    }

    pub fn len(&self) -> usize {
        self.sweeps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sweeps.is_empty()
    }
}

/// A base scan without enough sweeps after it to fill a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncatedWindow {
    pub id: usize,
    pub base_scan: PathBuf,
    pub available: usize,
}

/// Sweep files of one directory snapshot.
#[derive(Debug, Clone, Default)]
pub struct SweepListing {
    /// All sweep files in sorted order
    pub sweeps: Vec<SweepFile>,
    /// The subset of `sweeps` that are base scans
    pub base_scans: Vec<SweepFile>,
}

/// Result of windowing a listing.
#[derive(Debug, Clone, Default)]
pub struct WindowIndex {
    pub windows: Vec<VolumeWindow>,
    pub truncated: Vec<TruncatedWindow>,
}

/// List candidate files in `dir` (non-recursive), sorted by file name.
///
/// With `name_prefix`, only files whose name starts with it are kept.
pub fn list_directory(
    dir: &Path,
    config: &AssemblyConfig,
    name_prefix: Option<&str>,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            AssemblyError::Indexing(format!("cannot list {}: {}", dir.display(), e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.into_path();
        let matches_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e == config.file_extension)
            .unwrap_or(false);
        if !matches_ext {
            continue;
        }

        if let Some(prefix) = name_prefix {
            if !file_name(&path).starts_with(prefix) {
                continue;
            }
        }

        files.push(path);
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Classify a sorted file listing into sweeps and base scans.
pub fn classify(files: &[PathBuf], config: &AssemblyConfig) -> SweepListing {
    let mut listing = SweepListing::default();

    for path in files {
        let name = file_name(path);
        if !name.ends_with(&config.sweep_suffix) {
            continue;
        }

        let sweep = SweepFile {
            path: path.clone(),
            ordinal: listing.sweeps.len(),
            tilt: parse_tilt(name, &config.sweep_suffix),
            is_base_scan: is_base_scan(name, &config.base_scan_suffix),
        };

        if sweep.is_base_scan {
            listing.base_scans.push(sweep.clone());
        }
        listing.sweeps.push(sweep);
    }

    listing
}

/// Build one window per base scan.
///
/// Fails if a base scan is not part of the sweep listing.
pub fn build_windows(listing: &SweepListing, config: &AssemblyConfig) -> Result<WindowIndex> {
    let tilts = config.tilts;
    let sweeps = &listing.sweeps;
    let mut index = WindowIndex::default();

    for base in &listing.base_scans {
        let start = sweeps
            .iter()
            .position(|s| s.path == base.path)
            .ok_or_else(|| {
                AssemblyError::Indexing(format!(
                    "base scan {} not found in sweep listing",
                    base.path.display()
                ))
            })?;

        let mut end = (start + tilts).min(sweeps.len());
        if config.reject_interrupted {
            if let Some(next) = sweeps[start + 1..end].iter().position(|s| s.is_base_scan) {
                end = start + 1 + next;
            }
        }

        if end - start < tilts {
            debug!(
                base_scan = %base.path.display(),
                available = end - start,
                expected = tilts,
                "Dropping short window"
            );
            index.truncated.push(TruncatedWindow {
                id: start,
                base_scan: base.path.clone(),
                available: end - start,
            });
            continue;
        }

        index.windows.push(VolumeWindow {
            id: start,
            sweeps: sweeps[start..end].to_vec(),
        });
    }

    Ok(index)
}

/// List, classify and window one directory.
pub fn index_directory(
    dir: &Path,
    config: &AssemblyConfig,
    name_prefix: Option<&str>,
) -> Result<WindowIndex> {
    let files = list_directory(dir, config, name_prefix)?;
    let listing = classify(&files, config);
    let index = build_windows(&listing, config)?;

    info!(
        dir = %dir.display(),
        files = files.len(),
        sweeps = listing.sweeps.len(),
        base_scans = listing.base_scans.len(),
        windows = index.windows.len(),
        truncated = index.truncated.len(),
        "Indexed sweep directory"
    );
    if listing.base_scans.is_empty() && !listing.sweeps.is_empty() {
        warn!(dir = %dir.display(), "No base scans found among sweep files");
    }

    Ok(index)
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|s| s.to_str()).unwrap_or("")
}

/// The suffix must not be preceded by a digit, so tilt 11 is not tilt 1.
fn is_base_scan(name: &str, base_suffix: &str) -> bool {
    match name.strip_suffix(base_suffix) {
        Some(head) => !head.ends_with(|c: char| c.is_ascii_digit()),
        None => false,
    }
}

/// Tilt number: the digits token right before the sweep suffix.
fn parse_tilt(name: &str, sweep_suffix: &str) -> Option<u32> {
    let head = name.strip_suffix(sweep_suffix)?.trim_end_matches('_');
    head.rsplit('_').next()?.parse().ok()
}

//! JSON-backed radar I/O.
//!
//! Stands in for the NetCDF backend so pipeline tests run without the
//! native libraries. Volumes are stored as `serde_json` documents under
//! whatever file name the caller chooses.

use std::fs;
use std::path::Path;

use cfradial::{RadarError, RadarIo, RadarResult, RadarVolume};

/// [`RadarIo`] that stores each volume as one JSON document.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRadarIo;

impl RadarIo for JsonRadarIo {
    fn read(&self, path: &Path) -> RadarResult<RadarVolume> {
        let bytes = fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| {
            RadarError::InvalidFormat(format!("{}: {}", path.display(), e))
        })
    }

    fn write(&self, path: &Path, volume: &RadarVolume) -> RadarResult<()> {
        let bytes = serde_json::to_vec(volume)
            .map_err(|e| RadarError::InvalidFormat(format!("{}: {}", path.display(), e)))?;
        fs::write(path, bytes)?;
        Ok(())
    }
}

//! In-memory radar volume model.
//!
//! A [`RadarVolume`] holds one or more sweeps laid out the way CF/Radial
//! lays them out: every per-ray array is indexed by ray, every field is a
//! row-major `nrays x ngates` block, and the sweep table maps sweeps onto
//! inclusive ray ranges.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RadarError, RadarResult};
use crate::time::TimeAxis;

/// One moment field (reflectivity, velocity, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Physical units (e.g. "dBZ", "m/s")
    pub units: String,
    /// Value marking missing samples
    pub fill_value: f32,
    /// Samples, row-major `nrays x ngates`
    pub data: Vec<f32>,
}

impl Field {
    pub fn new(units: impl Into<String>, fill_value: f32, data: Vec<f32>) -> Self {
        Self {
            units: units.into(),
            fill_value,
            data,
        }
    }
}

/// Per-sweep metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepTable {
    pub sweep_number: Vec<i32>,
    /// Target elevation angle of each sweep (degrees)
    pub fixed_angle: Vec<f32>,
    pub start_ray_index: Vec<usize>,
    /// Inclusive
    pub end_ray_index: Vec<usize>,
    /// Scan mode per sweep, e.g. "azimuth_surveillance"
    pub sweep_mode: Vec<String>,
}

impl SweepTable {
    /// Table for a single sweep covering rays `0..nrays`.
    pub fn single(sweep_number: i32, fixed_angle: f32, nrays: usize, mode: &str) -> Self {
        Self {
            sweep_number: vec![sweep_number],
            fixed_angle: vec![fixed_angle],
            start_ray_index: vec![0],
            end_ray_index: vec![nrays.saturating_sub(1)],
            sweep_mode: vec![mode.to_string()],
        }
    }

    pub fn len(&self) -> usize {
        self.sweep_number.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sweep_number.is_empty()
    }
}

/// Radar site location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters above mean sea level
    pub altitude: f64,
}

/// A radar volume: one sweep as read from disk, or many after joining.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarVolume {
    pub time: TimeAxis,
    /// Gate center distances (meters)
    pub range: Vec<f32>,
    pub azimuth: Vec<f32>,
    pub elevation: Vec<f32>,
    pub fields: BTreeMap<String, Field>,
    pub sweeps: SweepTable,
    pub location: Location,
    /// Global attributes
    pub metadata: BTreeMap<String, String>,
}

impl RadarVolume {
    pub fn nrays(&self) -> usize {
        self.time.data.len()
    }

    pub fn ngates(&self) -> usize {
        self.range.len()
    }

    pub fn nsweeps(&self) -> usize {
        self.sweeps.len()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Reference instant of the time axis.
    pub fn start_datetime(&self) -> DateTime<Utc> {
        self.time.start
    }

    /// CF units string of the time axis.
    pub fn time_units(&self) -> String {
        self.time.units()
    }

    /// Check that every array agrees with the ray, gate and sweep counts.
    pub fn validate(&self) -> RadarResult<()> {
        let nrays = self.nrays();
        let ngates = self.ngates();

        if self.azimuth.len() != nrays || self.elevation.len() != nrays {
            return Err(RadarError::InvalidFormat(format!(
                "angle arrays ({} azimuth, {} elevation) do not match {} rays",
                self.azimuth.len(),
                self.elevation.len(),
                nrays
            )));
        }

        for (name, field) in &self.fields {
            if field.data.len() != nrays * ngates {
                return Err(RadarError::InvalidFormat(format!(
                    "field {} has {} samples, expected {}x{}",
                    name,
                    field.data.len(),
                    nrays,
                    ngates
                )));
            }
        }

        let sweeps = &self.sweeps;
        let n = sweeps.len();
        if sweeps.fixed_angle.len() != n
            || sweeps.start_ray_index.len() != n
            || sweeps.end_ray_index.len() != n
        {
            return Err(RadarError::InvalidFormat(
                "sweep table columns have different lengths".to_string(),
            ));
        }

        for (start, end) in sweeps.start_ray_index.iter().zip(&sweeps.end_ray_index) {
            if start > end || *end >= nrays {
                return Err(RadarError::InvalidFormat(format!(
                    "sweep ray range {}..={} outside {} rays",
                    start, end, nrays
                )));
            }
        }

        Ok(())
    }
}

//! Native CF/Radial reading and writing using the netcdf library.
//!
//! Only the variables a sweep-to-volume merge needs are carried: the time,
//! range and angle coordinates, the sweep table, the site location, every
//! `(time, range)` moment field and the global attributes.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Once;

use tracing::debug;

use crate::error::{RadarError, RadarResult};
use crate::io::RadarIo;
use crate::time::{parse_time_units, TimeAxis};
use crate::volume::{Field, Location, RadarVolume, SweepTable};

/// Fill value used when a field carries no `_FillValue` attribute.
pub const DEFAULT_FILL_VALUE: f32 = -9999.0;

const DEFAULT_SWEEP_MODE: &str = "azimuth_surveillance";

/// Variables that share the `(time, range)` shape but are not moments.
const NON_FIELD_VARIABLES: &[&str] = &[
    "time",
    "range",
    "azimuth",
    "elevation",
    "sweep_number",
    "fixed_angle",
    "sweep_start_ray_index",
    "sweep_end_ray_index",
    "sweep_mode",
    "latitude",
    "longitude",
    "altitude",
];

/// Silence HDF5's automatic error printing to stderr.
///
/// The HDF5 C library prints diagnostics even when the Rust side handles
/// the error (for example when probing optional attributes). Call this
/// once early in `main`, before any NetCDF file is opened.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 with null handlers only disables printing.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// [`RadarIo`] backed by CF/Radial NetCDF files.
#[derive(Debug, Clone, Default)]
pub struct NetCdfRadarIo;

impl NetCdfRadarIo {
    pub fn new() -> Self {
        silence_hdf5_errors();
        Self
    }
}

impl RadarIo for NetCdfRadarIo {
    fn read(&self, path: &Path) -> RadarResult<RadarVolume> {
        read_cfradial(path)
    }

    fn write(&self, path: &Path, volume: &RadarVolume) -> RadarResult<()> {
        write_cfradial(path, volume)
    }
}

/// Read one CF/Radial file.
pub fn read_cfradial(path: &Path) -> RadarResult<RadarVolume> {
    let nc = netcdf::open(path)?;

    let nrays = nc
        .dimension("time")
        .ok_or_else(|| RadarError::MissingData("time dimension".to_string()))?
        .len();
    let nsweeps = nc
        .dimension("sweep")
        .ok_or_else(|| RadarError::MissingData("sweep dimension".to_string()))?
        .len();

    let time_var = nc
        .variable("time")
        .ok_or_else(|| RadarError::MissingData("time variable".to_string()))?;
    let units = get_str_attr(&time_var, "units")
        .ok_or_else(|| RadarError::MissingData("time units".to_string()))?;
    let start = parse_time_units(&units)?;
    let time_data: Vec<f64> = time_var.get_values(..)?;

    let range: Vec<f32> = required(&nc, "range")?.get_values(..)?;
    let azimuth: Vec<f32> = required(&nc, "azimuth")?.get_values(..)?;
    let elevation: Vec<f32> = required(&nc, "elevation")?.get_values(..)?;

    let sweep_number: Vec<i32> = required(&nc, "sweep_number")?.get_values(..)?;
    let fixed_angle: Vec<f32> = required(&nc, "fixed_angle")?.get_values(..)?;
    let start_ray: Vec<i32> = required(&nc, "sweep_start_ray_index")?.get_values(..)?;
    let end_ray: Vec<i32> = required(&nc, "sweep_end_ray_index")?.get_values(..)?;

    let sweep_mode = match nc.variable("sweep_mode") {
        Some(var) => (0..nsweeps)
            .map(|i| {
                var.get_string((i,))
                    .map(|s| s.trim_end_matches('\0').trim().to_string())
                    .unwrap_or_else(|_| DEFAULT_SWEEP_MODE.to_string())
            })
            .collect(),
        None => vec![DEFAULT_SWEEP_MODE.to_string(); nsweeps],
    };

    let sweeps = SweepTable {
        sweep_number,
        fixed_angle,
        start_ray_index: to_indices(&start_ray, "sweep_start_ray_index")?,
        end_ray_index: to_indices(&end_ray, "sweep_end_ray_index")?,
        sweep_mode,
    };

    let location = Location {
        latitude: scalar_f64(&nc, "latitude")?,
        longitude: scalar_f64(&nc, "longitude")?,
        altitude: scalar_f64(&nc, "altitude").unwrap_or(0.0),
    };

    let mut fields = BTreeMap::new();
    for var in nc.variables() {
        let name = var.name();
        if NON_FIELD_VARIABLES.contains(&name.as_str()) {
            continue;
        }
        let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
        if dims != ["time", "range"] {
            continue;
        }
        fields.insert(name, read_field(&var)?);
    }

    let mut metadata = BTreeMap::new();
    for attr in nc.attributes() {
        if let Ok(netcdf::AttributeValue::Str(value)) = attr.value() {
            metadata.insert(attr.name().to_string(), value);
        }
    }

    debug!(
        path = %path.display(),
        rays = nrays,
        gates = range.len(),
        sweeps = nsweeps,
        fields = fields.len(),
        "Read CF/Radial file"
    );

    let volume = RadarVolume {
        time: TimeAxis::new(start, time_data),
        range,
        azimuth,
        elevation,
        fields,
        sweeps,
        location,
        metadata,
    };
    volume.validate()?;
    Ok(volume)
}

/// Write a volume as CF/Radial, replacing any existing file at `path`.
pub fn write_cfradial(path: &Path, volume: &RadarVolume) -> RadarResult<()> {
    let mut nc = netcdf::create(path)?;

    nc.add_dimension("time", volume.nrays())?;
    nc.add_dimension("range", volume.ngates())?;
    nc.add_dimension("sweep", volume.nsweeps())?;

    nc.add_attribute("Conventions", "CF/Radial")?;
    for (key, value) in &volume.metadata {
        if key != "Conventions" {
            nc.add_attribute(key, value.as_str())?;
        }
    }

    {
        let mut var = nc.add_variable::<f64>("time", &["time"])?;
        var.put_attribute("units", volume.time.units().as_str())?;
        var.put_attribute("standard_name", "time")?;
        var.put_values(&volume.time.data, ..)?;
    }
    {
        let mut var = nc.add_variable::<f32>("range", &["range"])?;
        var.put_attribute("units", "meters")?;
        var.put_values(&volume.range, ..)?;
    }
    {
        let mut var = nc.add_variable::<f32>("azimuth", &["time"])?;
        var.put_attribute("units", "degrees")?;
        var.put_values(&volume.azimuth, ..)?;
    }
    {
        let mut var = nc.add_variable::<f32>("elevation", &["time"])?;
        var.put_attribute("units", "degrees")?;
        var.put_values(&volume.elevation, ..)?;
    }

    let sweeps = &volume.sweeps;
    nc.add_variable::<i32>("sweep_number", &["sweep"])?
        .put_values(&sweeps.sweep_number, ..)?;
    nc.add_variable::<f32>("fixed_angle", &["sweep"])?
        .put_values(&sweeps.fixed_angle, ..)?;
    nc.add_variable::<i32>("sweep_start_ray_index", &["sweep"])?
        .put_values(&to_i32(&sweeps.start_ray_index)?, ..)?;
    nc.add_variable::<i32>("sweep_end_ray_index", &["sweep"])?
        .put_values(&to_i32(&sweeps.end_ray_index)?, ..)?;
    {
        let mut var = nc.add_string_variable("sweep_mode", &["sweep"])?;
        for (i, mode) in sweeps.sweep_mode.iter().enumerate().take(volume.nsweeps()) {
            var.put_string(mode, (i,))?;
        }
    }

    nc.add_variable::<f64>("latitude", &[])?
        .put_values(&[volume.location.latitude], ..)?;
    nc.add_variable::<f64>("longitude", &[])?
        .put_values(&[volume.location.longitude], ..)?;
    nc.add_variable::<f64>("altitude", &[])?
        .put_values(&[volume.location.altitude], ..)?;

    for (name, field) in &volume.fields {
        let mut var = nc.add_variable::<f32>(name, &["time", "range"])?;
        var.set_fill_value(field.fill_value)?;
        var.put_attribute("units", field.units.as_str())?;
        var.put_values(&field.data, ..)?;
    }

    debug!(
        path = %path.display(),
        rays = volume.nrays(),
        sweeps = volume.nsweeps(),
        "Wrote CF/Radial file"
    );

    Ok(())
}

// =============================================================================
// Internal helpers
// =============================================================================

fn required<'f>(nc: &'f netcdf::File, name: &str) -> RadarResult<netcdf::Variable<'f>> {
    nc.variable(name)
        .ok_or_else(|| RadarError::MissingData(format!("{} variable", name)))
}

fn scalar_f64(nc: &netcdf::File, name: &str) -> RadarResult<f64> {
    let values: Vec<f64> = required(nc, name)?.get_values(..)?;
    values
        .first()
        .copied()
        .ok_or_else(|| RadarError::MissingData(format!("{} value", name)))
}

/// Read a moment, applying packing attributes and keeping missing samples
/// at the field's fill value.
fn read_field(var: &netcdf::Variable) -> RadarResult<Field> {
    let raw: Vec<f32> = var.get_values(..)?;
    let fill_value = get_f32_attr(var, "_FillValue").unwrap_or(DEFAULT_FILL_VALUE);
    let scale_factor = get_f32_attr(var, "scale_factor").unwrap_or(1.0);
    let add_offset = get_f32_attr(var, "add_offset").unwrap_or(0.0);
    let units = get_str_attr(var, "units").unwrap_or_default();

    let data = raw
        .iter()
        .map(|&v| {
            if v == fill_value {
                fill_value
            } else {
                v * scale_factor + add_offset
            }
        })
        .collect();

    Ok(Field {
        units,
        fill_value,
        data,
    })
}

fn to_indices(values: &[i32], name: &str) -> RadarResult<Vec<usize>> {
    values
        .iter()
        .map(|&v| {
            usize::try_from(v)
                .map_err(|_| RadarError::InvalidFormat(format!("negative {}: {}", name, v)))
        })
        .collect()
}

fn to_i32(values: &[usize]) -> RadarResult<Vec<i32>> {
    values
        .iter()
        .map(|&v| {
            i32::try_from(v)
                .map_err(|_| RadarError::InvalidFormat(format!("ray index {} overflows i32", v)))
        })
        .collect()
}

/// Check if a variable has an attribute with the given name.
/// This avoids HDF5 error spam when checking for optional attributes.
fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

fn get_f32_attr(var: &netcdf::Variable, name: &str) -> Option<f32> {
    if !has_attr(var, name) {
        return None;
    }
    let attr_value = var.attribute_value(name)?.ok()?;
    f32::try_from(attr_value).ok()
}

fn get_str_attr(var: &netcdf::Variable, name: &str) -> Option<String> {
    if !has_attr(var, name) {
        return None;
    }
    match var.attribute_value(name)?.ok()? {
        netcdf::AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}

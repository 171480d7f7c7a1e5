//! CF/Radial radar volumes.
//!
//! This crate provides the radar object model shared by the volume
//! assembly pipeline, the pairwise sweep join it merges with, and the
//! [`RadarIo`] seam through which sweep files are read and volumes are
//! written.
//!
//! # Backends
//!
//! The native NetCDF backend ([`NetCdfRadarIo`]) is behind the `netcdf`
//! feature because it links against the system `libnetcdf` and `libhdf5`.

pub mod error;
pub mod io;
pub mod join;
pub mod time;
pub mod volume;

#[cfg(feature = "netcdf")]
pub mod native;

pub use error::{RadarError, RadarResult};
pub use io::RadarIo;
pub use join::join_radar;
pub use time::{parse_time_units, TimeAxis};
pub use volume::{Field, Location, RadarVolume, SweepTable};

#[cfg(feature = "netcdf")]
pub use native::{read_cfradial, silence_hdf5_errors, write_cfradial, NetCdfRadarIo};

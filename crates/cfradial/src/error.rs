//! Error types for radar volume I/O and joining.

use thiserror::Error;

/// Result type for radar object operations.
pub type RadarResult<T> = Result<T, RadarError>;

/// Error types for reading, writing and joining radar volumes.
#[derive(Error, Debug)]
pub enum RadarError {
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Missing required variable, dimension or attribute
    #[error("Missing required data: {0}")]
    MissingData(String),

    /// Invalid data format
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    /// Two sweeps cannot be joined (gate count or range axis mismatch)
    #[error("Incompatible sweep geometry: {0}")]
    IncompatibleGeometry(String),

    /// Error reported by the NetCDF library
    #[error("NetCDF error: {0}")]
    NetCdf(String),
}

#[cfg(feature = "netcdf")]
impl From<netcdf::Error> for RadarError {
    fn from(e: netcdf::Error) -> Self {
        RadarError::NetCdf(e.to_string())
    }
}

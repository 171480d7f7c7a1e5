//! Volume assembly configuration.
//!
//! Defines how sweep files are recognised, how many tilts make a volume,
//! which fields get fill-value normalization and how outputs are named.

use serde::{Deserialize, Serialize};

/// Configuration for the sweep-to-volume pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    /// Number of tilts (sweeps) in a complete volume.
    pub tilts: usize,

    /// File name suffix of the first tilt of a volume.
    pub base_scan_suffix: String,

    /// File name suffix shared by every elevation scan.
    pub sweep_suffix: String,

    /// Extension of files considered when listing a directory.
    pub file_extension: String,

    /// Drop windows that run into the next volume's base scan.
    pub reject_interrupted: bool,

    /// Output file naming.
    pub naming: OutputNaming,

    /// Missing-data normalization.
    pub fill: FillPolicy,

    /// Fields normalized by the defect corrector. Each must be present.
    pub fields: Vec<String>,

    /// Worker threads; `None` uses the available parallelism.
    pub workers: Option<usize>,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            tilts: 8,
            base_scan_suffix: "1_PPI.nc".to_string(),
            sweep_suffix: "PPI.nc".to_string(),
            file_extension: "nc".to_string(),
            reject_interrupted: false,
            naming: OutputNaming::default(),
            fill: FillPolicy::default(),
            fields: default_fields(),
            workers: None,
        }
    }
}

fn default_fields() -> Vec<String> {
    ["DBZ", "VEL", "WIDTH", "ZDR", "PHIDP", "RHOHV", "KDP", "SQI"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl AssemblyConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from `GLUE_*` environment variables.
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("GLUE_TILTS") {
            if let Ok(tilts) = val.parse() {
                self.tilts = tilts;
            }
        }

        if let Ok(val) = std::env::var("GLUE_BASE_SCAN_SUFFIX") {
            self.base_scan_suffix = val;
        }

        if let Ok(val) = std::env::var("GLUE_SWEEP_SUFFIX") {
            self.sweep_suffix = val;
        }

        if let Ok(val) = std::env::var("GLUE_OUTPUT_PREFIX") {
            self.naming.prefix = val;
        }

        if let Ok(val) = std::env::var("GLUE_OUTPUT_QUALIFIER") {
            self.naming.qualifier = val;
        }

        if let Ok(val) = std::env::var("GLUE_WORKERS") {
            if let Ok(workers) = val.parse() {
                self.workers = Some(workers);
            }
        }

        if let Ok(val) = std::env::var("GLUE_REJECT_INTERRUPTED") {
            self.reject_interrupted = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("GLUE_FIELDS") {
            self.fields = val
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.tilts == 0 {
            return Err("tilts must be > 0".to_string());
        }

        if self.sweep_suffix.is_empty() || self.base_scan_suffix.is_empty() {
            return Err("sweep and base scan suffixes must not be empty".to_string());
        }

        if !self.base_scan_suffix.ends_with(&self.sweep_suffix) {
            return Err(format!(
                "base scan suffix '{}' must end with sweep suffix '{}'",
                self.base_scan_suffix, self.sweep_suffix
            ));
        }

        if self.workers == Some(0) {
            return Err("workers must be > 0".to_string());
        }

        if self.naming.prefix.is_empty() || self.naming.qualifier.is_empty() {
            return Err("output prefix and qualifier must not be empty".to_string());
        }

        self.fill.validate()
    }
}

/// Output file naming: `<prefix>_volume_%Y%m%d-%H%M%S.<qualifier>.nc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputNaming {
    pub prefix: String,
    pub qualifier: String,
}

impl Default for OutputNaming {
    fn default() -> Self {
        Self {
            prefix: "xprecipradar_guc".to_string(),
            qualifier: "b1".to_string(),
        }
    }
}

/// Missing-data sentinel handling.
///
/// Samples below `lower_sentinel`, above `upper_sentinel`, or NaN are
/// replaced by `fill_value`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillPolicy {
    pub fill_value: f32,
    pub lower_sentinel: f32,
    pub upper_sentinel: f32,
}

impl Default for FillPolicy {
    fn default() -> Self {
        Self {
            fill_value: -9999.0,
            lower_sentinel: -9000.0,
            upper_sentinel: 1.0e30,
        }
    }
}

impl FillPolicy {
    /// Whether a sample counts as missing data.
    pub fn is_missing(&self, value: f32) -> bool {
        value.is_nan() || value < self.lower_sentinel || value > self.upper_sentinel
    }

    /// The fill value must itself classify as missing, otherwise
    /// normalization would not be idempotent.
    pub fn validate(&self) -> Result<(), String> {
        if self.lower_sentinel >= self.upper_sentinel {
            return Err("lower_sentinel must be below upper_sentinel".to_string());
        }

        if !self.is_missing(self.fill_value) {
            return Err(format!(
                "fill_value {} lies inside the valid range ({}, {})",
                self.fill_value, self.lower_sentinel, self.upper_sentinel
            ));
        }

        Ok(())
    }
}

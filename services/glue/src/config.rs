//! Glue service configuration.
//!
//! Settings come from an optional YAML file, then `GLUE_*` environment
//! variables, then command-line flags, each overriding the last.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use volume_assembly::AssemblyConfig;

/// Default ARM datastream of the sweep files.
pub const DEFAULT_DATASTREAM: &str = "gucxprecipradarS2.00";

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlueConfig {
    /// Directory holding the raw sweep files (month mode)
    pub data_dir: Option<PathBuf>,

    /// Root directory for assembled volumes (month mode)
    pub output_dir: Option<PathBuf>,

    /// Datastream prefix of sweep file names
    pub datastream: String,

    /// Assembly settings
    pub assembly: AssemblyConfig,
}

impl Default for GlueConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            output_dir: None,
            datastream: DEFAULT_DATASTREAM.to_string(),
            assembly: AssemblyConfig::default(),
        }
    }
}

impl GlueConfig {
    /// Load from `path` if given, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("GLUE_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(val));
        }
        if let Ok(val) = std::env::var("GLUE_OUTPUT_DIR") {
            self.output_dir = Some(PathBuf::from(val));
        }
        if let Ok(val) = std::env::var("GLUE_DATASTREAM") {
            self.datastream = val;
        }
        self.assembly.apply_env();
    }

    /// File name prefix selecting one month of sweeps.
    pub fn month_prefix(&self, month: &str) -> String {
        format!("{}.{}", self.datastream, month)
    }

    /// Input and output directories for month mode.
    ///
    /// Volumes go to `<output_dir>/<YYYYMM>_glue`.
    pub fn month_dirs(&self, month: &str) -> Result<(PathBuf, PathBuf)> {
        let Some(data_dir) = &self.data_dir else {
            bail!("month mode needs data_dir in the config file or GLUE_DATA_DIR");
        };
        let Some(output_dir) = &self.output_dir else {
            bail!("month mode needs output_dir in the config file or GLUE_OUTPUT_DIR");
        };
        Ok((data_dir.clone(), output_dir.join(format!("{}_glue", month))))
    }
}

/// Parse a `YYYYMM` month argument.
pub fn parse_month(value: &str) -> Result<String, String> {
    if value.len() != 6 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("expected YYYYMM, got '{}'", value));
    }
    let month: u32 = value[4..].parse().map_err(|_| format!("invalid month in '{}'", value))?;
    if !(1..=12).contains(&month) {
        return Err(format!("month out of range in '{}'", value));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month("202203").unwrap(), "202203");
        assert!(parse_month("2022-03").is_err());
        assert!(parse_month("20223").is_err());
        assert!(parse_month("202213").is_err());
        assert!(parse_month("202200").is_err());
        assert!(parse_month("abcdef").is_err());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = GlueConfig::from_yaml_str(
            r#"
data_dir: /data/sail/raw
output_dir: /data/sail/glue
assembly:
  tilts: 6
  naming:
    qualifier: c1
"#,
        )
        .unwrap();

        assert_eq!(config.data_dir, Some(PathBuf::from("/data/sail/raw")));
        assert_eq!(config.datastream, DEFAULT_DATASTREAM);
        assert_eq!(config.assembly.tilts, 6);
        assert_eq!(config.assembly.naming.qualifier, "c1");
        assert_eq!(config.assembly.naming.prefix, "xprecipradar_guc");
        assert_eq!(config.assembly.fields.len(), 8);
    }

    #[test]
    fn test_month_prefix_and_dirs() {
        let config = GlueConfig {
            data_dir: Some(PathBuf::from("/raw")),
            output_dir: Some(PathBuf::from("/out")),
            ..Default::default()
        };
        assert_eq!(config.month_prefix("202203"), "gucxprecipradarS2.00.202203");

        let (input, output) = config.month_dirs("202203").unwrap();
        assert_eq!(input, PathBuf::from("/raw"));
        assert_eq!(output, PathBuf::from("/out/202203_glue"));
    }

    #[test]
    fn test_month_dirs_require_config() {
        assert!(GlueConfig::default().month_dirs("202203").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("glue.yaml");
        fs::write(&path, "datastream: gucxprecipradarS3.00\n").unwrap();

        let config = GlueConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.datastream, "gucxprecipradarS3.00");
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(GlueConfig::from_yaml_file(Path::new("/nonexistent/glue.yaml")).is_err());
    }
}

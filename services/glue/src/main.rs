//! Radar volume glue service.
//!
//! Builds volume scans from a directory of single-elevation sweep files:
//! every base scan opens a window of consecutive tilts, each window is
//! merged, repaired and written as one CF/Radial volume.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use cfradial::RadarIo;
use clap::{ArgAction, ArgGroup, Parser};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use volume_assembly::{assemble_directory, ExecutionMode};

use config::{parse_month, GlueConfig};

#[derive(Parser, Debug)]
#[command(name = "radar-glue")]
#[command(about = "Create volume scans from individual radar elevation scans")]
#[command(group(ArgGroup::new("source").required(true).args(["input_path", "month"])))]
struct Args {
    /// Directory containing the sweep files
    #[arg(requires = "output_path")]
    input_path: Option<PathBuf>,

    /// Directory for assembled volumes
    output_path: Option<PathBuf>,

    /// Process one month (YYYYMM) using the directories from the config file
    #[arg(long, value_parser = parse_month, conflicts_with_all = ["input_path", "output_path"])]
    month: Option<String>,

    /// Run granules one at a time on the main thread
    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    serial: bool,

    /// Configuration file path (YAML)
    #[arg(short, long, env = "GLUE_CONFIG")]
    config: Option<PathBuf>,

    /// Tilts per volume
    #[arg(long)]
    tilts: Option<usize>,

    /// Worker threads (default: available parallelism)
    #[arg(long)]
    workers: Option<usize>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

/// Directories and listing filter of one run.
#[derive(Debug, PartialEq)]
struct Job {
    input: PathBuf,
    output: PathBuf,
    name_prefix: Option<String>,
}

impl Job {
    fn resolve(args: &Args, config: &GlueConfig) -> Result<Self> {
        if let Some(month) = &args.month {
            let (input, output) = config.month_dirs(month)?;
            return Ok(Self {
                input,
                output,
                name_prefix: Some(config.month_prefix(month)),
            });
        }

        match (&args.input_path, &args.output_path) {
            (Some(input), Some(output)) => Ok(Self {
                input: input.clone(),
                output: output.clone(),
                name_prefix: None,
            }),
            _ => bail!("expected INPUT_PATH and OUTPUT_PATH, or --month"),
        }
    }
}

fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args.log_level, args.json_logs)?;

    info!("Starting radar glue");

    let mut config = GlueConfig::load(args.config.as_deref())?;
    if let Some(tilts) = args.tilts {
        config.assembly.tilts = tilts;
    }
    if let Some(workers) = args.workers {
        config.assembly.workers = Some(workers);
    }
    config
        .assembly
        .validate()
        .map_err(|e| anyhow!("Invalid configuration: {}", e))?;

    let job = Job::resolve(&args, &config)?;
    if !job.input.is_dir() {
        bail!("Input directory {} is not readable", job.input.display());
    }

    let io = backend()?;
    let mode = if args.serial {
        ExecutionMode::Serial
    } else {
        ExecutionMode::from_config(&config.assembly)
    };

    info!(
        input = %job.input.display(),
        output = %job.output.display(),
        prefix = ?job.name_prefix,
        tilts = config.assembly.tilts,
        mode = ?mode,
        "Assembling volumes"
    );

    let report = assemble_directory(
        io,
        &job.input,
        &job.output,
        &config.assembly,
        job.name_prefix.as_deref(),
        mode,
    )?;

    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        skipped = report.skipped.len(),
        "Radar glue finished"
    );

    Ok(())
}

fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    Ok(())
}

#[cfg(feature = "netcdf")]
fn backend() -> Result<Arc<dyn RadarIo>> {
    Ok(Arc::new(cfradial::NetCdfRadarIo::new()))
}

#[cfg(not(feature = "netcdf"))]
fn backend() -> Result<Arc<dyn RadarIo>> {
    bail!("No radar I/O backend compiled in; rebuild with `--features netcdf`")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("radar-glue").chain(argv.iter().copied()))
    }

    #[test]
    fn test_positional_paths() {
        let args = parse(&["/data/202203", "/data/202203/glued"]).unwrap();
        assert_eq!(args.input_path, Some(PathBuf::from("/data/202203")));
        assert_eq!(args.output_path, Some(PathBuf::from("/data/202203/glued")));
        assert!(!args.serial);

        let job = Job::resolve(&args, &GlueConfig::default()).unwrap();
        assert_eq!(job.name_prefix, None);
        assert_eq!(job.output, PathBuf::from("/data/202203/glued"));
    }

    #[test]
    fn test_month_mode() {
        let args = parse(&["--month", "202203", "--serial", "true"]).unwrap();
        assert_eq!(args.month.as_deref(), Some("202203"));
        assert!(args.serial);

        let config = GlueConfig {
            data_dir: Some(PathBuf::from("/raw")),
            output_dir: Some(PathBuf::from("/glue")),
            ..Default::default()
        };
        let job = Job::resolve(&args, &config).unwrap();
        assert_eq!(
            job,
            Job {
                input: PathBuf::from("/raw"),
                output: PathBuf::from("/glue/202203_glue"),
                name_prefix: Some("gucxprecipradarS2.00.202203".to_string()),
            }
        );
    }

    #[test]
    fn test_serial_false() {
        let args = parse(&["--month", "202203", "--serial", "false"]).unwrap();
        assert!(!args.serial);
    }

    #[test]
    fn test_bad_month_rejected() {
        assert!(parse(&["--month", "2022-03"]).is_err());
        assert!(parse(&["--month", "22203"]).is_err());
    }

    #[test]
    fn test_missing_arguments_rejected() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["/only/input"]).is_err());
    }

    #[test]
    fn test_month_conflicts_with_paths() {
        assert!(parse(&["/in", "/out", "--month", "202203"]).is_err());
    }

    #[test]
    fn test_common_flags() {
        let args = parse(&[
            "/in",
            "/out",
            "--tilts",
            "6",
            "--workers",
            "2",
            "--log-level",
            "debug",
            "--json-logs",
        ])
        .unwrap();
        assert_eq!(args.tilts, Some(6));
        assert_eq!(args.workers, Some(2));
        assert_eq!(args.log_level, "debug");
        assert!(args.json_logs);
    }

    #[test]
    fn test_month_mode_without_dirs_fails() {
        let args = parse(&["--month", "202203"]).unwrap();
        assert!(Job::resolve(&args, &GlueConfig::default()).is_err());
    }

    #[cfg(not(feature = "netcdf"))]
    #[test]
    fn test_missing_backend_is_error() {
        assert!(backend().is_err());
    }
}

//! End-to-end assembly of sweep directories with the JSON backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use cfradial::{join_radar, RadarIo, RadarResult, RadarVolume};
use test_utils::{reference_start, JsonRadarIo, SweepDir, SweepDirBuilder, DATASTREAM, RAW_MISSING};
use volume_assembly::{
    assemble_directory, AssemblyConfig, BatchReport, ExecutionMode, FailureKind, GranuleState,
};

fn second_volume() -> DateTime<Utc> {
    reference_start() + Duration::minutes(5)
}

fn run(input: &SweepDir, output: &Path, mode: ExecutionMode) -> BatchReport {
    run_with(Arc::new(JsonRadarIo), input, output, &AssemblyConfig::default(), mode)
}

fn run_with(
    io: Arc<dyn RadarIo>,
    input: &SweepDir,
    output: &Path,
    config: &AssemblyConfig,
    mode: ExecutionMode,
) -> BatchReport {
    assemble_directory(io, input.path(), output, config, None, mode).expect("batch should run")
}

fn two_volumes() -> SweepDir {
    SweepDirBuilder::new()
        .volume(reference_start(), 8)
        .volume(second_volume(), 8)
        .build()
}

/// Rewrite one sweep file in place.
fn rewrite(path: &Path, edit: impl FnOnce(RadarVolume) -> RadarVolume) {
    let volume = JsonRadarIo.read(path).unwrap();
    JsonRadarIo.write(path, &edit(volume)).unwrap();
}

/// Delegates to [`JsonRadarIo`] but panics when reading one path.
struct PanicOnRead {
    path: PathBuf,
}

impl RadarIo for PanicOnRead {
    fn read(&self, path: &Path) -> RadarResult<RadarVolume> {
        if path == self.path {
            panic!("reader crashed on {}", path.display());
        }
        JsonRadarIo.read(path)
    }

    fn write(&self, path: &Path, volume: &RadarVolume) -> RadarResult<()> {
        JsonRadarIo.write(path, volume)
    }
}

fn parallel() -> ExecutionMode {
    ExecutionMode::Parallel { workers: 4 }
}

fn output_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        return Vec::new();
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    files.sort();
    files
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

fn read(path: &Path) -> RadarVolume {
    JsonRadarIo.read(path).unwrap()
}

#[test]
fn two_volumes_produce_two_outputs() {
    let input = SweepDirBuilder::new()
        .volume(reference_start(), 8)
        .volume(second_volume(), 8)
        .build();
    let out = tempfile::tempdir().unwrap();

    let report = run(&input, out.path(), parallel());

    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 0);
    assert!(report.skipped.is_empty());

    let names: Vec<String> = output_files(out.path()).iter().map(|p| file_name(p)).collect();
    assert_eq!(
        names,
        vec![
            "xprecipradar_guc_volume_20220301-000005.b1.nc".to_string(),
            "xprecipradar_guc_volume_20220301-000505.b1.nc".to_string(),
        ]
    );
}

#[test]
fn output_volume_is_corrected() {
    let input = SweepDirBuilder::new()
        .geometry(12, 5)
        .volume(reference_start(), 8)
        .build();
    let out = tempfile::tempdir().unwrap();

    let report = run(&input, out.path(), ExecutionMode::Serial);
    let volume = read(report.outputs()[0]);

    assert!(volume.validate().is_ok());
    assert_eq!(volume.nsweeps(), 8);
    assert_eq!(volume.nrays(), 8 * 12);
    assert_eq!(volume.sweeps.sweep_mode.len(), 8);
    assert!(volume
        .sweeps
        .sweep_mode
        .iter()
        .all(|m| m == "azimuth_surveillance"));
    // Sweeps stay in window order.
    assert_eq!(
        volume.sweeps.fixed_angle,
        vec![0.5, 1.5, 2.5, 3.5, 4.5, 5.5, 6.5, 7.5]
    );
    assert_eq!(volume.sweeps.start_ray_index[1], 12);

    // Rays were recorded in pairs sharing one second.
    let times = &volume.time.data;
    assert!(times.windows(2).all(|p| p[0] < p[1]));
    assert_eq!(times[0], 0.0);
    assert_eq!(times[1].floor(), 0.0);

    for name in AssemblyConfig::default().fields {
        let field = volume.field(&name).unwrap();
        assert_eq!(field.fill_value, -9999.0);
        assert!(!field.data.contains(&RAW_MISSING), "{name} still has raw sentinels");
        assert!(field.data.contains(&-9999.0));
    }
}

#[test]
fn corrupt_sweep_fails_only_its_window() {
    let input = SweepDirBuilder::new()
        .volume(reference_start(), 8)
        .volume(second_volume(), 8)
        .build();
    input.corrupt(3);
    let out = tempfile::tempdir().unwrap();

    let report = run(&input, out.path(), parallel());

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failures_of(FailureKind::Read), 1);

    let failed = &report.outcomes[0];
    assert_eq!(failed.window_id, 0);
    assert_eq!(failed.final_state, GranuleState::Failed);
    assert_eq!(failed.failed_in, Some(GranuleState::Reading));

    let ok = &report.outcomes[1];
    assert_eq!(ok.window_id, 8);
    assert_eq!(ok.final_state, GranuleState::Done);

    let files = output_files(out.path());
    assert_eq!(files.len(), 1);
    assert_eq!(
        file_name(&files[0]),
        "xprecipradar_guc_volume_20220301-000505.b1.nc"
    );
}

#[test]
fn mismatched_geometry_is_merge_failure() {
    let input = SweepDirBuilder::new()
        .geometry(12, 5)
        .sweeps(reference_start(), 1..=4)
        .geometry(12, 7)
        .sweeps(reference_start(), 5..=8)
        .build();
    let out = tempfile::tempdir().unwrap();

    let report = run(&input, out.path(), ExecutionMode::Serial);

    assert_eq!(report.failures_of(FailureKind::Merge), 1);
    assert_eq!(report.outcomes[0].failed_in, Some(GranuleState::Merging));
    assert!(output_files(out.path()).is_empty());
}

#[test]
fn short_directory_produces_nothing() {
    let input = SweepDirBuilder::new().volume(reference_start(), 7).build();
    let out = tempfile::tempdir().unwrap();

    let report = run(&input, out.path(), parallel());

    assert!(report.outcomes.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].available, 7);
    assert!(output_files(out.path()).is_empty());
}

#[test]
fn empty_directory_is_not_an_error() {
    let input = SweepDirBuilder::new().build();
    let out = tempfile::tempdir().unwrap();

    let report = run(&input, out.path(), parallel());
    assert!(report.outcomes.is_empty());
    assert!(report.skipped.is_empty());
}

#[test]
fn parallel_matches_serial() {
    let input = SweepDirBuilder::new()
        .volume(reference_start(), 8)
        .volume(second_volume(), 8)
        .volume(second_volume() + Duration::minutes(5), 8)
        .build();
    input.corrupt(12);
    let serial_out = tempfile::tempdir().unwrap();
    let parallel_out = tempfile::tempdir().unwrap();

    let serial = run(&input, serial_out.path(), ExecutionMode::Serial);
    let parallel = run(&input, parallel_out.path(), parallel());

    let summary = |r: &BatchReport| -> Vec<(usize, Option<FailureKind>)> {
        r.outcomes
            .iter()
            .map(|o| (o.window_id, o.failure_kind()))
            .collect()
    };
    assert_eq!(summary(&serial), summary(&parallel));

    let serial_files = output_files(serial_out.path());
    let parallel_files = output_files(parallel_out.path());
    assert_eq!(serial_files.len(), 2);
    for (a, b) in serial_files.iter().zip(&parallel_files) {
        assert_eq!(file_name(a), file_name(b));
        assert_eq!(std::fs::read(a).unwrap(), std::fs::read(b).unwrap());
    }
}

#[test]
fn rerun_overwrites_outputs() {
    let input = SweepDirBuilder::new()
        .volume(reference_start(), 8)
        .volume(second_volume(), 8)
        .build();
    let out = tempfile::tempdir().unwrap();

    run(&input, out.path(), parallel());
    let before: Vec<Vec<u8>> = output_files(out.path())
        .iter()
        .map(|p| std::fs::read(p).unwrap())
        .collect();

    let report = run(&input, out.path(), parallel());
    assert_eq!(report.succeeded(), 2);

    let after: Vec<Vec<u8>> = output_files(out.path())
        .iter()
        .map(|p| std::fs::read(p).unwrap())
        .collect();
    assert_eq!(before, after);
}

#[test]
fn month_prefix_limits_the_listing() {
    let april = reference_start() + Duration::days(31);
    let input = SweepDirBuilder::new()
        .volume(reference_start(), 8)
        .volume(april, 8)
        .build();
    let out = tempfile::tempdir().unwrap();

    let report = assemble_directory(
        Arc::new(JsonRadarIo),
        input.path(),
        out.path(),
        &AssemblyConfig::default(),
        Some(&format!("{}.202203", DATASTREAM)),
        parallel(),
    )
    .unwrap();

    assert_eq!(report.succeeded(), 1);
    assert!(file_name(report.outputs()[0]).contains("20220301"));
}

#[test]
fn unrelated_files_are_ignored() {
    let input = SweepDirBuilder::new()
        .volume(reference_start(), 8)
        .file("gucxprecipradarS2.00.20220301.000100.raw.csu.sail-20220301-000100_1_RHI.nc", b"{}")
        .file("README.txt", b"not radar data")
        .build();
    let out = tempfile::tempdir().unwrap();

    let report = run(&input, out.path(), parallel());
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.outcomes[0].window_id, 0);
}

#[test]
fn invalid_config_is_rejected_before_indexing() {
    let input = SweepDirBuilder::new().volume(reference_start(), 8).build();
    let out = tempfile::tempdir().unwrap();
    let config = AssemblyConfig {
        tilts: 0,
        ..Default::default()
    };

    let err = assemble_directory(
        Arc::new(JsonRadarIo),
        input.path(),
        out.path(),
        &config,
        None,
        ExecutionMode::Serial,
    )
    .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Indexing);
    assert!(output_files(out.path()).is_empty());
}

#[test]
fn out_of_range_first_time_fails_only_its_window() {
    let input = two_volumes();
    rewrite(&input.sweep_files()[0], |mut sweep| {
        // NetCDF default double fill
        sweep.time.data[0] = 9.969209968386869e36;
        sweep
    });
    let out = tempfile::tempdir().unwrap();

    let report = run(&input, out.path(), ExecutionMode::Parallel { workers: 2 });

    assert_eq!(report.outcomes.len(), 2);
    let failed = &report.outcomes[0];
    assert_eq!(failed.failure_kind(), Some(FailureKind::Correction));
    assert_eq!(failed.failed_in, Some(GranuleState::Committing));
    assert!(report.outcomes[1].is_success());
    assert_eq!(output_files(out.path()).len(), 1);
}

#[test]
fn panicking_granule_does_not_stop_the_batch() {
    let input = two_volumes();
    let io = Arc::new(PanicOnRead {
        path: input.sweep_files()[2].clone(),
    });
    let out = tempfile::tempdir().unwrap();

    let report = run_with(
        io,
        &input,
        out.path(),
        &AssemblyConfig::default(),
        ExecutionMode::Parallel { workers: 2 },
    );

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.failures_of(FailureKind::Aborted), 1);
    assert_eq!(report.outcomes[0].window_id, 0);
    assert_eq!(report.outcomes[0].final_state, GranuleState::Failed);
    assert_eq!(report.outcomes[1].window_id, 8);
    assert!(report.outcomes[1].is_success());

    let files = output_files(out.path());
    assert_eq!(files.len(), 1);
    assert_eq!(
        file_name(&files[0]),
        "xprecipradar_guc_volume_20220301-000505.b1.nc"
    );
}

#[test]
fn multi_sweep_file_is_rejected() {
    let input = two_volumes();
    let files = input.sweep_files();
    let extra = read(&files[4]);
    rewrite(&files[3], |sweep| join_radar(sweep, extra).unwrap());
    let out = tempfile::tempdir().unwrap();

    let report = run(&input, out.path(), ExecutionMode::Serial);

    assert_eq!(report.succeeded(), 1);
    let failed = &report.outcomes[0];
    assert_eq!(failed.failure_kind(), Some(FailureKind::Correction));
    assert_eq!(failed.failed_in, Some(GranuleState::Correcting));
    assert!(failed.result.as_ref().unwrap_err().to_string().contains("9 sweeps"));

    let volume = read(report.outputs()[0]);
    assert_eq!(volume.nsweeps(), 8);
}

#[test]
fn missing_sweep_window_is_skipped_in_strict_mode() {
    let input = two_volumes();
    input.remove(3);
    let out = tempfile::tempdir().unwrap();
    let config = AssemblyConfig {
        reject_interrupted: true,
        ..Default::default()
    };

    let report = run_with(
        Arc::new(JsonRadarIo),
        &input,
        out.path(),
        &config,
        ExecutionMode::Serial,
    );

    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].id, 0);
    assert_eq!(report.skipped[0].available, 7);
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].window_id, 7);
    assert!(report.outcomes[0].is_success());
}

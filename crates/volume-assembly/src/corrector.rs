//! Post-merge defect repair.
//!
//! Three independent repairs are applied to a freshly merged volume:
//!
//! 1. Fill-value normalization of the configured moment fields.
//! 2. Sweep-mode replication: the join keeps a single sweep-mode entry,
//!    so the base scan's mode is repeated once per sweep.
//! 3. Timestamp de-duplication: rays sharing one recorded time get
//!    increasing sub-second offsets inside their integer-second bucket, so
//!    every group of identical times becomes strictly increasing. A shifted
//!    ray may still land on a distinct time already present in that second.

use std::collections::HashMap;

use cfradial::RadarVolume;
use tracing::debug;

use crate::assembler::AssembledVolume;
use crate::config::{AssemblyConfig, FillPolicy};
use crate::error::{AssemblyError, Result};

/// Offset between rays sharing a timestamp, in seconds.
pub const DEDUP_STEP_SECONDS: f64 = 0.001;

/// What the corrector changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrectionReport {
    pub samples_filled: usize,
    pub sweep_modes_replicated: usize,
    pub rays_retimed: usize,
}

/// Apply every repair and return the corrected volume.
pub fn correct(
    assembled: AssembledVolume,
    config: &AssemblyConfig,
) -> Result<(RadarVolume, CorrectionReport)> {
    let AssembledVolume {
        mut volume,
        base_sweep_mode,
    } = assembled;

    check_structure(&volume, config)?;

    let samples_filled = normalize_fill_values(&mut volume, &config.fields, &config.fill)?;
    let mode = base_sweep_mode
        .or_else(|| volume.sweeps.sweep_mode.first().cloned())
        .ok_or_else(|| AssemblyError::MalformedVolume("no sweep mode recorded".to_string()))?;
    let sweep_modes_replicated = replicate_sweep_mode(&mut volume, &mode, config.tilts);
    let rays_retimed = dedup_timestamps(&mut volume.time.data);

    let report = CorrectionReport {
        samples_filled,
        sweep_modes_replicated,
        rays_retimed,
    };
    debug!(
        samples_filled = report.samples_filled,
        sweep_modes = report.sweep_modes_replicated,
        rays_retimed = report.rays_retimed,
        "Corrected volume"
    );

    Ok((volume, report))
}

fn check_structure(volume: &RadarVolume, config: &AssemblyConfig) -> Result<()> {
    volume
        .validate()
        .map_err(|e| AssemblyError::MalformedVolume(e.to_string()))?;

    // A sweep file holding several sweeps would otherwise pass as one tilt.
    if volume.nsweeps() != config.tilts {
        return Err(AssemblyError::MalformedVolume(format!(
            "volume has {} sweeps, expected {}",
            volume.nsweeps(),
            config.tilts
        )));
    }

    if let Some(missing) = config
        .fields
        .iter()
        .find(|f| !volume.fields.contains_key(*f))
    {
        return Err(AssemblyError::MalformedVolume(format!(
            "missing field {}",
            missing
        )));
    }

    Ok(())
}

/// Remap sentinel samples of the named fields to the canonical fill value.
///
/// Returns how many samples changed. Applying it twice changes nothing the
/// second time.
pub fn normalize_fill_values(
    volume: &mut RadarVolume,
    fields: &[String],
    policy: &FillPolicy,
) -> Result<usize> {
    let mut changed = 0;

    for name in fields {
        let field = volume
            .fields
            .get_mut(name)
            .ok_or_else(|| AssemblyError::MalformedVolume(format!("missing field {}", name)))?;

        for sample in field.data.iter_mut() {
            // Bitwise compare so NaN and an identical fill both count right.
            if policy.is_missing(*sample) && sample.to_bits() != policy.fill_value.to_bits() {
                *sample = policy.fill_value;
                changed += 1;
            }
        }
        field.fill_value = policy.fill_value;
    }

    Ok(changed)
}

/// Repeat the base scan's sweep mode `tilts` times.
pub fn replicate_sweep_mode(volume: &mut RadarVolume, mode: &str, tilts: usize) -> usize {
    volume.sweeps.sweep_mode = vec![mode.to_string(); tilts];
    tilts
}

/// Spread rays that share a timestamp over distinct sub-second offsets.
///
/// The k-th ray (0-based, order of appearance) of a group with time `t`
/// becomes `t + k * step`. `step` is [`DEDUP_STEP_SECONDS`] unless the
/// group is too large to stay below `floor(t) + 1`, in which case the
/// remaining room in the second is split evenly. Returns the number of
/// rays whose time changed.
///
/// Ordering is only guaranteed within each group: `[10.0, 10.0, 10.001]`
/// becomes `[10.0, 10.001, 10.001]`.
pub fn dedup_timestamps(times: &mut [f64]) -> usize {
    let mut groups: HashMap<u64, usize> = HashMap::new();
    for t in times.iter() {
        *groups.entry(t.to_bits()).or_insert(0) += 1;
    }

    let mut seen: HashMap<u64, usize> = HashMap::new();
    let mut retimed = 0;

    for t in times.iter_mut() {
        let key = t.to_bits();
        let group_len = groups.get(&key).copied().unwrap_or(1);
        if group_len < 2 {
            continue;
        }

        let k = seen.entry(key).or_insert(0);
        if *k > 0 {
            let base = f64::from_bits(key);
            let room = base.floor() + 1.0 - base;
            let step = DEDUP_STEP_SECONDS.min(room / group_len as f64);
            *t = base + *k as f64 * step;
            retimed += 1;
        }
        *k += 1;
    }

    retimed
}

//! Pairwise sweep join.

use tracing::debug;

use crate::error::{RadarError, RadarResult};
use crate::volume::{Field, RadarVolume};

/// Largest per-gate range difference (meters) tolerated when joining.
pub const RANGE_TOLERANCE_M: f32 = 1.0;

/// Append the rays of `b` to `a`.
///
/// Ray times of `b` are re-referenced onto `a`'s time start. Fields
/// present in only one input are padded with that field's fill value.
/// Sweep numbers are renumbered and ray indices offset.
///
/// The sweep-mode column is taken from `a` only, so a volume built by
/// folding single sweeps carries one sweep-mode entry no matter how many
/// sweeps it holds.
pub fn join_radar(mut a: RadarVolume, b: RadarVolume) -> RadarResult<RadarVolume> {
    check_geometry(&a, &b)?;

    let a_rays = a.nrays();
    let b_rays = b.nrays();
    let ngates = a.ngates();

    let offset = b.time.offset_from(&a.time);
    a.time.data.extend(b.time.data.iter().map(|t| t + offset));
    a.azimuth.extend_from_slice(&b.azimuth);
    a.elevation.extend_from_slice(&b.elevation);

    // Fields only in `a`
    for (name, field) in a.fields.iter_mut() {
        match b.fields.get(name) {
            Some(other) => field.data.extend_from_slice(&other.data),
            None => field
                .data
                .extend(std::iter::repeat(field.fill_value).take(b_rays * ngates)),
        }
    }

    // Fields only in `b`
    for (name, field) in b.fields {
        if a.fields.contains_key(&name) {
            continue;
        }
        let mut data = vec![field.fill_value; a_rays * ngates];
        data.extend(field.data);
        a.fields.insert(name, Field { data, ..field });
    }

    let next_number = a.sweeps.sweep_number.last().map(|n| n + 1).unwrap_or(0);
    let b_sweeps = b.sweeps.len() as i32;
    a.sweeps
        .sweep_number
        .extend(next_number..next_number + b_sweeps);
    a.sweeps.fixed_angle.extend(b.sweeps.fixed_angle);
    a.sweeps
        .start_ray_index
        .extend(b.sweeps.start_ray_index.iter().map(|i| i + a_rays));
    a.sweeps
        .end_ray_index
        .extend(b.sweeps.end_ray_index.iter().map(|i| i + a_rays));

    debug!(
        rays = a.nrays(),
        sweeps = a.nsweeps(),
        time_offset = offset,
        "Joined sweep"
    );

    Ok(a)
}

fn check_geometry(a: &RadarVolume, b: &RadarVolume) -> RadarResult<()> {
    if a.ngates() != b.ngates() {
        return Err(RadarError::IncompatibleGeometry(format!(
            "gate count {} vs {}",
            a.ngates(),
            b.ngates()
        )));
    }

    if let Some((gate, (ra, rb))) = a
        .range
        .iter()
        .zip(&b.range)
        .enumerate()
        .find(|(_, (ra, rb))| (*ra - *rb).abs() > RANGE_TOLERANCE_M)
    {
        return Err(RadarError::IncompatibleGeometry(format!(
            "range differs at gate {}: {} m vs {} m",
            gate, ra, rb
        )));
    }

    Ok(())
}

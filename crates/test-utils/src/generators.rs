//! Synthetic sweep generators.
//!
//! These generators create predictable, verifiable sweeps that can be used
//! across the test suite. Every value is exactly representable in `f32` so a
//! sweep survives a trip through [`crate::JsonRadarIo`] unchanged.

use std::collections::BTreeMap;

use cfradial::{Field, Location, RadarVolume, SweepTable, TimeAxis};
use chrono::{DateTime, Duration, TimeZone, Utc};

/// Moment fields carried by every synthetic sweep, with their units.
pub const SYNTHETIC_FIELDS: [(&str, &str); 8] = [
    ("DBZ", "dBZ"),
    ("VEL", "m/s"),
    ("WIDTH", "m/s"),
    ("ZDR", "dB"),
    ("PHIDP", "degrees"),
    ("RHOHV", "unitless"),
    ("KDP", "degrees/km"),
    ("SQI", "unitless"),
];

/// Raw sentinel written by the radar for missing samples.
pub const RAW_MISSING: f32 = -32768.0;

/// Seconds between consecutive tilts of one synthetic volume.
pub const TILT_SPACING_SECONDS: i64 = 20;

/// Sweep mode of every synthetic sweep.
pub const SYNTHETIC_SWEEP_MODE: &str = "azimuth_surveillance";

/// Start of the first synthetic volume, 2022-03-01T00:00:05Z.
pub fn reference_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2022, 3, 1, 0, 0, 5)
        .single()
        .expect("valid reference time")
}

/// Start time of tilt `tilt` of a volume starting at `volume_start`.
pub fn tilt_start(volume_start: DateTime<Utc>, tilt: usize) -> DateTime<Utc> {
    volume_start + Duration::seconds(tilt as i64 * TILT_SPACING_SECONDS)
}

/// Creates one sweep of the volume starting at [`reference_start`].
///
/// See [`synthetic_sweep_at`].
pub fn synthetic_sweep(tilt: usize, nrays: usize, ngates: usize) -> RadarVolume {
    synthetic_sweep_at(reference_start(), tilt, nrays, ngates)
}

/// Creates tilt `tilt` of a volume starting at `volume_start`.
///
/// - ray `i` is recorded at `i / 2` whole seconds, so rays come in pairs
///   sharing a timestamp
/// - fixed angle is `0.5 + tilt` degrees
/// - every sample at `(ray + gate) % 5 == 0` holds [`RAW_MISSING`]
/// - other samples cycle through half-unit steps between -5.0 and 14.5
pub fn synthetic_sweep_at(
    volume_start: DateTime<Utc>,
    tilt: usize,
    nrays: usize,
    ngates: usize,
) -> RadarVolume {
    let fixed_angle = 0.5 + tilt as f32;

    let mut fields = BTreeMap::new();
    for (k, (name, units)) in SYNTHETIC_FIELDS.iter().enumerate() {
        let mut data = Vec::with_capacity(nrays * ngates);
        for ray in 0..nrays {
            for gate in 0..ngates {
                data.push(sample_value(ray, gate, k));
            }
        }
        fields.insert(name.to_string(), Field::new(*units, RAW_MISSING, data));
    }

    let mut metadata = BTreeMap::new();
    metadata.insert("Conventions".to_string(), "CF/Radial".to_string());
    metadata.insert("instrument_name".to_string(), "xprecipradar".to_string());

    RadarVolume {
        time: TimeAxis::new(
            tilt_start(volume_start, tilt),
            (0..nrays).map(|i| (i / 2) as f64).collect(),
        ),
        range: (0..ngates).map(|g| g as f32 * 100.0 + 50.0).collect(),
        azimuth: (0..nrays).map(|i| (i * 360 / nrays.max(1)) as f32).collect(),
        elevation: vec![fixed_angle; nrays],
        fields,
        sweeps: SweepTable::single(0, fixed_angle, nrays, SYNTHETIC_SWEEP_MODE),
        location: Location {
            latitude: 38.5,
            longitude: -106.75,
            altitude: 2886.0,
        },
        metadata,
    }
}

fn sample_value(ray: usize, gate: usize, field: usize) -> f32 {
    if (ray + gate) % 5 == 0 {
        RAW_MISSING
    } else {
        ((ray * 7 + gate * 3 + field) % 40) as f32 * 0.5 - 5.0
    }
}

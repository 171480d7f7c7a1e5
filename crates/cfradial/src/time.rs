//! CF time axis handling.
//!
//! CF/Radial stores ray times as offsets in seconds from a reference
//! instant written in the `units` attribute, e.g.
//! `"seconds since 2022-03-01T00:00:05Z"`.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RadarError, RadarResult};

const UNITS_PREFIX: &str = "seconds since ";

/// Ray time axis of a radar volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeAxis {
    /// Reference instant, whole seconds
    pub start: DateTime<Utc>,
    /// Per-ray offsets in seconds from `start`
    pub data: Vec<f64>,
}

impl TimeAxis {
    pub fn new(start: DateTime<Utc>, data: Vec<f64>) -> Self {
        Self {
            start: truncate_to_second(start),
            data,
        }
    }

    /// The CF `units` string for this axis.
    pub fn units(&self) -> String {
        format!("{}{}", UNITS_PREFIX, self.start.format("%Y-%m-%dT%H:%M:%SZ"))
    }

    /// Time of the first ray, truncated to whole seconds.
    ///
    /// The fractional part of the first offset is dropped toward zero.
    /// `None` when there are no rays or the offset is not a representable
    /// instant (NaN, infinite, or a fill value such as 9.97e36).
    pub fn first_ray_time(&self) -> Option<DateTime<Utc>> {
        let first = *self.data.first()?;
        if !first.is_finite() {
            return None;
        }
        // `as` saturates, so out-of-range offsets fail in try_seconds.
        let offset = Duration::try_seconds(first.trunc() as i64)?;
        self.start.checked_add_signed(offset)
    }

    /// Offset in whole seconds between two reference instants.
    pub fn offset_from(&self, other: &TimeAxis) -> f64 {
        (self.start - other.start).num_seconds() as f64
    }
}

/// Parse a CF `units` string of the form `seconds since <ISO 8601>`.
pub fn parse_time_units(units: &str) -> RadarResult<DateTime<Utc>> {
    let stamp = units
        .trim()
        .strip_prefix(UNITS_PREFIX)
        .ok_or_else(|| RadarError::InvalidFormat(format!("unsupported time units: {}", units)))?;

    // Try full datetime with timezone
    if let Ok(dt) = DateTime::parse_from_rfc3339(stamp) {
        return Ok(truncate_to_second(dt.with_timezone(&Utc)));
    }

    // Try without timezone (assume UTC)
    for format in ["%Y-%m-%dT%H:%M:%SZ", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(stamp, format) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    Err(RadarError::InvalidFormat(format!("unparseable time units: {}", units)))
}

fn truncate_to_second(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units_with_zulu() {
        let dt = parse_time_units("seconds since 2022-03-01T00:00:05Z").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2022, 3, 1, 0, 0, 5).unwrap());
    }

    #[test]
    fn test_parse_units_without_zone() {
        let dt = parse_time_units("seconds since 2022-03-01T12:30:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2022, 3, 1, 12, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_units_rejects_other_units() {
        assert!(parse_time_units("days since 2022-03-01").is_err());
        assert!(parse_time_units("seconds since yesterday").is_err());
    }

    #[test]
    fn test_units_format() {
        let start = Utc.with_ymd_and_hms(2022, 3, 1, 0, 0, 5).unwrap();
        let axis = TimeAxis::new(start, vec![0.0]);
        assert_eq!(axis.units(), "seconds since 2022-03-01T00:00:05Z");
        assert_eq!(parse_time_units(&axis.units()).unwrap(), start);
    }

    #[test]
    fn test_first_ray_time_truncates() {
        let start = Utc.with_ymd_and_hms(2022, 3, 1, 0, 0, 5).unwrap();
        let axis = TimeAxis::new(start, vec![2.9, 3.1]);
        assert_eq!(
            axis.first_ray_time().unwrap(),
            Utc.with_ymd_and_hms(2022, 3, 1, 0, 0, 7).unwrap()
        );
        assert!(TimeAxis::new(start, vec![]).first_ray_time().is_none());
    }

    #[test]
    fn test_first_ray_time_rejects_unrepresentable_offsets() {
        let start = Utc.with_ymd_and_hms(2022, 3, 1, 0, 0, 5).unwrap();
        for bad in [9.969209968386869e36, f64::INFINITY, f64::NEG_INFINITY, f64::NAN, 1.0e15] {
            assert!(
                TimeAxis::new(start, vec![bad, 1.0]).first_ray_time().is_none(),
                "{bad} accepted"
            );
        }
    }
}

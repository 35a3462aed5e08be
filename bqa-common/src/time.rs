//! Timestamp utilities

use chrono::{DateTime, Duration, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Wall-clock time of a sample recorded `offset_s` seconds after `origin`
///
/// Resolution is one microsecond. Returns `None` for non-finite offsets or
/// results outside chrono's representable range.
pub fn offset_timestamp(origin: DateTime<Utc>, offset_s: f64) -> Option<DateTime<Utc>> {
    if !offset_s.is_finite() {
        return None;
    }
    let micros = (offset_s * 1_000_000.0).round();
    if micros.abs() > i64::MAX as f64 {
        return None;
    }
    origin.checked_add_signed(Duration::microseconds(micros as i64))
}

/// Convert a sample count at a given rate into seconds
pub fn samples_to_seconds(samples: usize, sample_rate_hz: f64) -> f64 {
    samples as f64 / sample_rate_hz
}

/// Nearest whole number of samples spanning `seconds` at `interval_s`
///
/// Returns 0 for a non-positive duration or an unusable interval.
pub fn seconds_to_samples(seconds: f64, interval_s: f64) -> usize {
    if !(seconds > 0.0) || !(interval_s > 0.0) || !seconds.is_finite() {
        return 0;
    }
    (seconds / interval_s).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[test]
    fn test_offset_timestamp_fractional_seconds() {
        let origin = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let ts = offset_timestamp(origin, 1.25).unwrap();
        assert_eq!(ts.timestamp(), origin.timestamp() + 1);
        assert_eq!(ts.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_offset_timestamp_rejects_nan() {
        let origin = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert!(offset_timestamp(origin, f64::NAN).is_none());
        assert!(offset_timestamp(origin, f64::INFINITY).is_none());
    }

    #[test]
    fn test_samples_to_seconds() {
        assert_eq!(samples_to_seconds(250, 100.0), 2.5);
    }

    #[test]
    fn test_seconds_to_samples() {
        assert_eq!(seconds_to_samples(0.2, 0.01), 20);
        assert_eq!(seconds_to_samples(0.2, 0.04), 5);
        assert_eq!(seconds_to_samples(0.05, 0.001), 50);
        // Accumulated float error in the interval still rounds cleanly
        assert_eq!(seconds_to_samples(0.21, 0.010000000000000009), 21);
        assert_eq!(seconds_to_samples(0.0, 0.01), 0);
        assert_eq!(seconds_to_samples(0.2, 0.0), 0);
        assert_eq!(seconds_to_samples(0.2, f64::NAN), 0);
    }
}

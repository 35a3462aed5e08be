//! Tidal-volume distribution and breath rate over a QA table

use serde::Serialize;

use crate::models::QaTable;

/// Half-open or closed tidal-volume range in mL
///
/// `low: None` means `< high`, `high: None` means `> low`, both present
/// means `[low, high]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumeRange {
    pub low: Option<f64>,
    pub high: Option<f64>,
}

impl VolumeRange {
    pub fn below(high: f64) -> Self {
        Self {
            low: None,
            high: Some(high),
        }
    }

    pub fn between(low: f64, high: f64) -> Self {
        Self {
            low: Some(low),
            high: Some(high),
        }
    }

    pub fn above(low: f64) -> Self {
        Self {
            low: Some(low),
            high: None,
        }
    }

    pub fn contains(&self, volume_ml: f64) -> bool {
        match (self.low, self.high) {
            (None, Some(high)) => volume_ml < high,
            (Some(low), None) => volume_ml > low,
            (Some(low), Some(high)) => (low..=high).contains(&volume_ml),
            (None, None) => true,
        }
    }

    pub fn label(&self) -> String {
        match (self.low, self.high) {
            (None, Some(high)) => format!("Vt < {}", high),
            (Some(low), None) => format!("Vt > {}", low),
            (Some(low), Some(high)) => format!("Vt in [{}, {}]", low, high),
            (None, None) => "Vt".to_string(),
        }
    }
}

/// Default clinical bands: below 400, 400-600, above 600 mL
pub fn default_volume_ranges() -> Vec<VolumeRange> {
    vec![
        VolumeRange::below(400.0),
        VolumeRange::between(400.0, 600.0),
        VolumeRange::above(600.0),
    ]
}

/// Share of breaths within one range
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeShare {
    pub range: VolumeRange,
    pub label: String,
    pub count: usize,
    pub percent: f64,
}

/// Aggregate statistics for a QA table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSummary {
    pub total_breaths: usize,
    /// Rows with a usable inhaled volume
    pub breaths_with_volume: usize,
    pub max_inhaled_volume_ml: Option<f64>,
    pub min_inhaled_volume_ml: Option<f64>,
    pub mean_inhaled_volume_ml: Option<f64>,
    pub ranges: Vec<RangeShare>,
    /// Rows per minute of recording
    pub breaths_per_minute: Option<f64>,
}

/// Summarize a table over the given volume ranges
///
/// Percentages are relative to rows with a finite inhaled volume.
/// `breaths_per_minute` is `None` when the duration is not positive.
pub fn summarize_table(
    table: &QaTable,
    recording_duration_s: f64,
    ranges: &[VolumeRange],
) -> TableSummary {
    let volumes: Vec<f64> = table
        .iter()
        .filter_map(|r| r.inhaled_volume_ml)
        .filter(|v| v.is_finite())
        .collect();

    let with_volume = volumes.len();
    let shares = ranges
        .iter()
        .map(|range| {
            let count = volumes.iter().filter(|&&v| range.contains(v)).count();
            let percent = if with_volume == 0 {
                0.0
            } else {
                100.0 * count as f64 / with_volume as f64
            };
            RangeShare {
                range: *range,
                label: range.label(),
                count,
                percent,
            }
        })
        .collect();

    let breaths_per_minute = (recording_duration_s > 0.0)
        .then(|| table.len() as f64 / (recording_duration_s / 60.0));

    TableSummary {
        total_breaths: table.len(),
        breaths_with_volume: with_volume,
        max_inhaled_volume_ml: volumes.iter().copied().reduce(f64::max),
        min_inhaled_volume_ml: volumes.iter().copied().reduce(f64::min),
        mean_inhaled_volume_ml: (with_volume > 0)
            .then(|| volumes.iter().sum::<f64>() / with_volume as f64),
        ranges: shares,
        breaths_per_minute,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BreathRecord, RefinedBreath};

    fn row(breath_number: u32, inhaled: Option<f64>) -> BreathRecord {
        BreathRecord {
            breath_number,
            start_time_s: 0.0,
            end_time_s: 1.0,
            insp_end_time_s: None,
            exp_start_time_s: None,
            start_timestamp: None,
            end_timestamp: None,
            peak_pressure_cmh2o: None,
            peak_flow_lpm: None,
            inhaled_volume_ml: inhaled,
            exhaled_volume_ml: None,
            inspiratory_time_s: None,
            inspiratory_flow_time_s: None,
            mean_inspiratory_pressure_cmh2o: None,
            sotair: false,
            sotair_gradient: None,
            sotair_time_gap_s: None,
            bounds: RefinedBreath {
                start: 0,
                end: 1,
                phases: None,
            },
        }
    }

    #[test]
    fn test_range_membership() {
        let ranges = default_volume_ranges();
        assert!(ranges[0].contains(399.9));
        assert!(!ranges[0].contains(400.0));
        assert!(ranges[1].contains(400.0));
        assert!(ranges[1].contains(600.0));
        assert!(!ranges[2].contains(600.0));
        assert_eq!(ranges[1].label(), "Vt in [400, 600]");
    }

    #[test]
    fn test_summary_shares_and_rate() {
        let table = QaTable::new(vec![
            row(1, Some(350.0)),
            row(2, Some(450.0)),
            row(3, Some(500.0)),
            row(4, Some(700.0)),
            row(5, None),
        ]);
        let summary = summarize_table(&table, 60.0, &default_volume_ranges());

        assert_eq!(summary.total_breaths, 5);
        assert_eq!(summary.breaths_with_volume, 4);
        assert_eq!(summary.max_inhaled_volume_ml, Some(700.0));
        assert_eq!(summary.min_inhaled_volume_ml, Some(350.0));
        assert_eq!(summary.mean_inhaled_volume_ml, Some(500.0));
        assert_eq!(summary.ranges[1].count, 2);
        assert!((summary.ranges[1].percent - 50.0).abs() < 1e-9);
        assert_eq!(summary.breaths_per_minute, Some(5.0));
    }

    #[test]
    fn test_empty_table() {
        let summary = summarize_table(&QaTable::default(), 0.0, &default_volume_ranges());
        assert_eq!(summary.total_breaths, 0);
        assert!(summary.max_inhaled_volume_ml.is_none());
        assert!(summary.breaths_per_minute.is_none());
        assert!(summary.ranges.iter().all(|r| r.percent == 0.0));
    }
}

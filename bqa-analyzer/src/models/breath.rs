//! Breath-level data: candidates, phase markers, refined boundaries and the
//! QA table rows built from them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tentative breath proposed by threshold crossing, `start < end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreathCandidate {
    pub start: usize,
    pub end: usize,
}

impl BreathCandidate {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of samples spanned (inclusive)
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

/// Inspiration end / expiration start of one breath
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseMarkers {
    pub insp_end: usize,
    pub exp_start: usize,
}

impl PhaseMarkers {
    pub fn new(insp_end: usize, exp_start: usize) -> Self {
        Self {
            insp_end,
            exp_start,
        }
    }

    /// `start <= insp_end <= exp_start <= end`
    pub fn is_ordered_within(&self, start: usize, end: usize) -> bool {
        start <= self.insp_end && self.insp_end <= self.exp_start && self.exp_start <= end
    }
}

/// Boundaries after zero-crossing snapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinedBreath {
    pub start: usize,
    pub end: usize,
    /// Absent when phase detection failed for this breath
    pub phases: Option<PhaseMarkers>,
}

impl RefinedBreath {
    /// Boundaries are usable for metric extraction
    pub fn is_valid(&self) -> bool {
        self.start < self.end
            && self
                .phases
                .map_or(true, |p| p.is_ordered_within(self.start, self.end))
    }
}

/// SOTAIR diagnostic values for one breath
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SotairAnalysis {
    /// Steepest flow gradient over the inspiratory phase (L/min/s)
    pub gradient: Option<f64>,
    /// Time from the steepest drop to expiration start (s)
    pub time_gap_s: f64,
    /// Sustained-opening signature present
    pub active: bool,
}

/// One row of the QA table
///
/// Values derived from phase markers are `None` when those markers are
/// absent; `check_qa_table` rejects such rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreathRecord {
    /// 1-based, sequential in detection order
    pub breath_number: u32,

    pub start_time_s: f64,
    pub end_time_s: f64,
    pub insp_end_time_s: Option<f64>,
    pub exp_start_time_s: Option<f64>,

    /// Wall-clock timestamps when the recording start is known
    pub start_timestamp: Option<DateTime<Utc>>,
    pub end_timestamp: Option<DateTime<Utc>>,

    pub peak_pressure_cmh2o: Option<f64>,
    pub peak_flow_lpm: Option<f64>,
    pub inhaled_volume_ml: Option<f64>,
    pub exhaled_volume_ml: Option<f64>,
    pub inspiratory_time_s: Option<f64>,
    pub inspiratory_flow_time_s: Option<f64>,
    pub mean_inspiratory_pressure_cmh2o: Option<f64>,

    pub sotair: bool,
    pub sotair_gradient: Option<f64>,
    pub sotair_time_gap_s: Option<f64>,

    /// Sample indices the metrics were computed from
    pub bounds: RefinedBreath,
}

/// Ordered per-breath metrics for one recording
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QaTable {
    records: Vec<BreathRecord>,
}

impl QaTable {
    pub fn new(records: Vec<BreathRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[BreathRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BreathRecord> {
        self.records.iter()
    }

    pub fn get(&self, breath_number: u32) -> Option<&BreathRecord> {
        self.records.iter().find(|r| r.breath_number == breath_number)
    }

    pub fn into_records(self) -> Vec<BreathRecord> {
        self.records
    }
}

impl<'a> IntoIterator for &'a QaTable {
    type Item = &'a BreathRecord;
    type IntoIter = std::slice::Iter<'a, BreathRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_ordering() {
        let markers = PhaseMarkers::new(10, 20);
        assert!(markers.is_ordered_within(0, 30));
        assert!(markers.is_ordered_within(10, 20));
        assert!(!markers.is_ordered_within(11, 30));
        assert!(!PhaseMarkers::new(21, 20).is_ordered_within(0, 30));
    }

    #[test]
    fn test_refined_breath_validity() {
        let valid = RefinedBreath {
            start: 5,
            end: 50,
            phases: Some(PhaseMarkers::new(20, 30)),
        };
        assert!(valid.is_valid());

        let no_phases = RefinedBreath {
            phases: None,
            ..valid
        };
        assert!(no_phases.is_valid());

        let collapsed = RefinedBreath {
            start: 50,
            end: 50,
            phases: None,
        };
        assert!(!collapsed.is_valid());
    }

    #[test]
    fn test_candidate_len() {
        assert_eq!(BreathCandidate::new(3, 7).len(), 5);
    }
}

//! Breath boundary detection
//!
//! Threshold-crossing scan over the flow and pressure channels that proposes
//! candidate (start, end) index pairs, one per inspiration-through-expiration
//! cycle.

use bqa_common::{Error, Result};
use tracing::debug;

use crate::models::{
    BreathCandidate, DetectionParameters, DetectionWindows, Recording, ResolvedThresholds,
    ThresholdMode,
};

/// Scanner state while walking the sample sequence
#[derive(Debug, Clone, Copy, PartialEq)]
enum ScanState {
    /// Waiting for a start; `armed` once flow has been at or below the start band
    Idle { armed: bool },
    /// Start found, waiting for expiration
    Inspiring { start: usize, armed: bool },
    /// Expiration entered, waiting for expiratory flow to decay
    Expiring { start: usize },
}

/// Breath boundary detector
pub struct BreathDetector {
    params: DetectionParameters,
}

impl BreathDetector {
    pub fn new(params: DetectionParameters) -> Self {
        Self { params }
    }

    /// Detect breath candidates in a recording
    ///
    /// Returns an empty vector when no breath is found. Candidates are ordered
    /// by start and never overlap. In `relative_to_peak` mode a recording
    /// without a single finite flow or pressure value is malformed input.
    pub fn detect(&self, recording: &Recording) -> Result<Vec<BreathCandidate>> {
        if recording.is_empty() {
            return Ok(Vec::new());
        }

        let thresholds = self.resolve_thresholds(recording)?;
        let windows = self.params.windows(recording.sample_interval_s());
        debug!(
            samples = recording.len(),
            confirm_window = windows.confirm,
            separation = windows.separation,
            start_low = thresholds.positive_flow_band.low,
            start_high = thresholds.positive_flow_band.high,
            start_pressure = thresholds.start_pressure_min,
            end_low = thresholds.negative_flow_band.low,
            end_high = thresholds.negative_flow_band.high,
            end_pressure = thresholds.end_pressure_max,
            "Scanning for breaths"
        );

        let flow = recording.flow();
        let start_low = thresholds.positive_flow_band.low;
        let recovery_level = -thresholds.negative_flow_band.low;

        let mut candidates = Vec::new();
        let mut state = ScanState::Idle { armed: false };

        for (i, &f) in flow.iter().enumerate() {
            state = match state {
                ScanState::Idle { armed } => {
                    if f <= start_low {
                        ScanState::Idle { armed: true }
                    } else if armed && self.confirms_start(recording, &thresholds, &windows, i) {
                        ScanState::Inspiring {
                            start: i,
                            armed: false,
                        }
                    } else {
                        ScanState::Idle { armed }
                    }
                }
                ScanState::Inspiring { start, armed } => {
                    let armed = armed || f <= start_low;
                    if armed && f > start_low && self.confirms_start(recording, &thresholds, &windows, i) {
                        // Most recent valid start wins
                        debug!(
                            discarded_start = start,
                            new_start = i,
                            "Start superseded before expiration was found"
                        );
                        ScanState::Inspiring {
                            start: i,
                            armed: false,
                        }
                    } else if i >= start + windows.separation
                        && self.confirms_expiration(recording, &thresholds, &windows, i)
                    {
                        ScanState::Expiring { start }
                    } else {
                        ScanState::Inspiring { start, armed }
                    }
                }
                ScanState::Expiring { start } => {
                    if f >= recovery_level {
                        if let Some(candidate) = self.accept(recording, start, i) {
                            candidates.push(candidate);
                        }
                        ScanState::Idle {
                            armed: f <= start_low,
                        }
                    } else {
                        ScanState::Expiring { start }
                    }
                }
            };
        }

        match state {
            ScanState::Inspiring { start, .. } | ScanState::Expiring { start } => {
                debug!(start, "Discarding incomplete breath at end of recording");
            }
            ScanState::Idle { .. } => {}
        }

        debug!(breaths = candidates.len(), "Breath detection complete");
        Ok(candidates)
    }

    fn resolve_thresholds(&self, recording: &Recording) -> Result<ResolvedThresholds> {
        match self.params.threshold_mode {
            ThresholdMode::Absolute => Ok(self.params.resolve(0.0, 0.0)),
            ThresholdMode::RelativeToPeak => {
                let max_flow = recording.max_flow().ok_or_else(|| {
                    Error::MalformedInput("no finite flow samples".to_string())
                })?;
                let max_pressure = recording.max_pressure().ok_or_else(|| {
                    Error::MalformedInput("no finite pressure samples".to_string())
                })?;
                Ok(self.params.resolve(max_flow, max_pressure))
            }
        }
    }

    /// Flow above the start band, confirmed by a peak above its high bound and
    /// a pressure rise within a full forward window
    fn confirms_start(
        &self,
        recording: &Recording,
        t: &ResolvedThresholds,
        w: &DetectionWindows,
        i: usize,
    ) -> bool {
        let window_end = i + w.confirm;
        if window_end > recording.len() {
            return false;
        }
        let peak_flow = nan_max(&recording.flow()[i..window_end]);
        let peak_pressure = nan_max(&recording.pressure()[i..window_end]);
        recording.flow()[i] > t.positive_flow_band.low
            && peak_flow > t.positive_flow_band.high
            && peak_pressure > t.start_pressure_min
    }

    /// Flow fallen into the negative band, reaching below its high magnitude
    /// while pressure stays low
    fn confirms_expiration(
        &self,
        recording: &Recording,
        t: &ResolvedThresholds,
        w: &DetectionWindows,
        i: usize,
    ) -> bool {
        if !(recording.flow()[i] < -t.negative_flow_band.low) {
            return false;
        }
        let window_end = (i + w.confirm).min(recording.len());
        let trough = nan_min(&recording.flow()[i..window_end]);
        let peak_pressure = nan_max(&recording.pressure()[i..window_end]);
        trough < -t.negative_flow_band.high && peak_pressure < t.end_pressure_max
    }

    fn accept(&self, recording: &Recording, start: usize, end: usize) -> Option<BreathCandidate> {
        let time = recording.time();
        let duration = time[end] - time[start];
        if duration < self.params.min_breath_duration_s {
            debug!(start, end, duration, "Discarding breath shorter than minimum duration");
            return None;
        }

        let has_gap = recording.flow()[start..=end]
            .iter()
            .chain(&recording.pressure()[start..=end])
            .any(|v| !v.is_finite());
        if has_gap {
            debug!(start, end, "Discarding breath containing non-numeric samples");
            return None;
        }

        Some(BreathCandidate::new(start, end))
    }
}

impl Default for BreathDetector {
    fn default() -> Self {
        Self::new(DetectionParameters::default())
    }
}

/// Detect breath candidates with the given parameters
pub fn detect_breaths(
    recording: &Recording,
    params: &DetectionParameters,
) -> Result<Vec<BreathCandidate>> {
    BreathDetector::new(params.clone()).detect(recording)
}

fn nan_max(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

fn nan_min(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

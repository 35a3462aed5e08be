//! Inspiration-end and expiration-start detection
//!
//! Inspiration end is the onset of the inspiratory flow plateau: the first
//! trailing window that is near the peak, has low variance and shows no
//! trend. Expiration start is the confirmed downward crossing of the
//! expiratory flow threshold. Windows are resolved from the recording's
//! sample interval.

use tracing::debug;

use crate::models::{BreathCandidate, PhaseMarkers, PhaseParameters, PhaseWindows, Recording};

/// Detect phase markers for every candidate
///
/// The result is parallel to `candidates`; entries are `None` where the
/// breath is too short or carries no positive flow.
pub fn detect_breath_phases(
    recording: &Recording,
    candidates: &[BreathCandidate],
    params: &PhaseParameters,
) -> Vec<Option<PhaseMarkers>> {
    let windows = params.windows(recording.sample_interval_s());
    candidates
        .iter()
        .enumerate()
        .map(|(i, candidate)| {
            let markers = detect_phases(recording.flow(), *candidate, params, &windows);
            if markers.is_none() {
                debug!(
                    candidate = i,
                    start = candidate.start,
                    end = candidate.end,
                    "No phase markers for breath"
                );
            }
            markers
        })
        .collect()
}

/// Detect phase markers for one breath
pub fn detect_single_breath_phases(
    recording: &Recording,
    candidate: BreathCandidate,
    params: &PhaseParameters,
) -> Option<PhaseMarkers> {
    let windows = params.windows(recording.sample_interval_s());
    detect_phases(recording.flow(), candidate, params, &windows)
}

fn detect_phases(
    flow: &[f64],
    candidate: BreathCandidate,
    params: &PhaseParameters,
    windows: &PhaseWindows,
) -> Option<PhaseMarkers> {
    let BreathCandidate { start, end } = candidate;
    if start >= end || end >= flow.len() {
        return None;
    }

    let search_from = start + windows.insp_end_skip;
    if search_from >= end {
        return None;
    }

    let peak = flow[start..=end]
        .iter()
        .copied()
        .filter(|f| f.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    if !(peak > 0.0) {
        return None;
    }

    let insp_end = find_plateau_onset(flow, start, search_from, end, peak, params, windows)
        .unwrap_or_else(|| argmax(flow, start, end));
    let exp_start = find_expiration_start(flow, insp_end, end, params, windows).unwrap_or(end);

    Some(PhaseMarkers::new(insp_end, exp_start))
}

/// First index whose trailing window is flat and near the peak
fn find_plateau_onset(
    flow: &[f64],
    start: usize,
    search_from: usize,
    end: usize,
    peak: f64,
    params: &PhaseParameters,
    windows: &PhaseWindows,
) -> Option<usize> {
    let window = windows.plateau.max(1);
    let floor = params.plateau_peak_fraction * peak;

    (search_from..=end).find(|&i| {
        if i + 1 < start + window {
            return false;
        }
        let values = &flow[i + 1 - window..=i];
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        mean > 0.0
            && mean >= floor
            && variance <= params.plateau_variance_threshold
            && trend_drift(values, mean).abs() <= params.plateau_drift_threshold
    })
}

/// Flow change across `values` along their least-squares line
fn trend_drift(values: &[f64], mean: f64) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let centre = (n - 1) as f64 / 2.0;
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (k, v) in values.iter().enumerate() {
        let x = k as f64 - centre;
        sxy += x * (v - mean);
        sxx += x * x;
    }
    sxy / sxx * (n - 1) as f64
}

/// Confirmed downward crossing of the expiration threshold after `insp_end`
fn find_expiration_start(
    flow: &[f64],
    insp_end: usize,
    end: usize,
    params: &PhaseParameters,
    windows: &PhaseWindows,
) -> Option<usize> {
    let threshold = params.exp_start_flow_threshold;
    let confirm = windows.exp_start_confirm.max(1);

    ((insp_end + 1)..=end).find(|&i| {
        let last = (i + confirm - 1).min(end);
        flow[i] < threshold
            && flow[i - 1] >= threshold
            && flow[i..=last].iter().all(|&f| f < threshold)
    })
}

fn argmax(flow: &[f64], start: usize, end: usize) -> usize {
    let mut best = start;
    for i in start..=end {
        if flow[i] > flow[best] || !flow[best].is_finite() {
            best = i;
        }
    }
    best
}

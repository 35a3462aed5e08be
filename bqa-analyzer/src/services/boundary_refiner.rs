//! Zero-crossing boundary refinement
//!
//! Snaps breath start/end and phase markers to the nearest flow sign change
//! within a bounded search radius, then repairs ordering so refined breaths
//! never overlap and markers stay inside their breath. Phase markers only
//! snap to crossings strictly inside the breath and between each other.

use tracing::debug;

use crate::models::{BreathCandidate, PhaseMarkers, Recording, RefinedBreath, RefinementParameters};

/// Index of the zero crossing nearest to `index` within `radius` samples
///
/// A crossing is a pair of adjacent finite samples whose signs differ (zero
/// counts as its own sign). The pair member closer to zero is returned.
/// Equidistant crossings resolve to the earlier one.
pub fn nearest_zero_crossing(flow: &[f64], index: usize, radius: usize) -> Option<usize> {
    nearest_zero_crossing_within(flow, index, radius, 0, flow.len().saturating_sub(1))
}

/// Like [`nearest_zero_crossing`], considering only crossings whose two
/// samples both lie in `[lo, hi]`
pub fn nearest_zero_crossing_within(
    flow: &[f64],
    index: usize,
    radius: usize,
    lo: usize,
    hi: usize,
) -> Option<usize> {
    if flow.len() < 2 || index >= flow.len() || lo >= hi {
        return None;
    }

    let from = index.saturating_sub(radius).max(lo);
    let to = (index + radius).min(flow.len() - 1).min(hi);

    let mut best: Option<usize> = None;
    for k in from..to {
        let (a, b) = (flow[k], flow[k + 1]);
        if !a.is_finite() || !b.is_finite() || sign(a) == sign(b) {
            continue;
        }
        let snapped = if b.abs() < a.abs() { k + 1 } else { k };
        let closer = match best {
            None => true,
            Some(current) => snapped.abs_diff(index) < current.abs_diff(index),
        };
        if closer {
            best = Some(snapped);
        }
    }
    best
}

/// Snap `index` to the nearest zero crossing, or leave it unchanged
pub fn snap_to_zero_crossing(flow: &[f64], index: usize, radius: usize) -> usize {
    nearest_zero_crossing(flow, index, radius).unwrap_or(index)
}

fn snap_within(flow: &[f64], index: usize, radius: usize, lo: usize, hi: usize) -> usize {
    nearest_zero_crossing_within(flow, index, radius, lo, hi).unwrap_or(index)
}

/// Refine every candidate and its phase markers
///
/// `phases` is parallel to `candidates`; missing entries are treated as
/// absent markers. A refined start always follows the previous refined end.
/// When snapping collapses a breath, the raw boundaries are kept.
pub fn refine_breath_detection(
    recording: &Recording,
    candidates: &[BreathCandidate],
    phases: &[Option<PhaseMarkers>],
    params: &RefinementParameters,
) -> Vec<RefinedBreath> {
    let flow = recording.flow();
    let radius = params.radius(recording.sample_interval_s());

    let mut refined = Vec::with_capacity(candidates.len());
    let mut previous_end: Option<usize> = None;

    for (i, candidate) in candidates.iter().enumerate() {
        let floor = previous_end.map_or(0, |end| end + 1);
        let markers = phases.get(i).copied().flatten();
        let breath = refine_single_breath(flow, *candidate, markers, floor, radius);
        previous_end = Some(previous_end.map_or(breath.end, |end| end.max(breath.end)));
        refined.push(breath);
    }

    refined
}

/// Refine one breath whose start may not precede `floor`
pub fn refine_single_breath(
    flow: &[f64],
    candidate: BreathCandidate,
    phases: Option<PhaseMarkers>,
    floor: usize,
    radius: usize,
) -> RefinedBreath {
    let mut start = snap_to_zero_crossing(flow, candidate.start, radius).max(floor);
    let mut end = snap_to_zero_crossing(flow, candidate.end, radius);

    if start >= end {
        debug!(
            raw_start = candidate.start,
            raw_end = candidate.end,
            "Snapping collapsed breath, keeping raw boundaries"
        );
        start = candidate.start.max(floor);
        end = candidate.end;
    }

    let phases = phases.map(|m| {
        if start >= end {
            return m;
        }
        let exp_start = if m.exp_start > m.insp_end {
            snap_within(flow, m.exp_start, radius, m.insp_end + 1, end - 1)
        } else {
            m.exp_start
        };
        let exp_start = exp_start.clamp(start, end);

        let insp_end = if m.insp_end < m.exp_start {
            snap_within(flow, m.insp_end, radius, start + 1, m.exp_start - 1)
        } else {
            m.insp_end
        };
        let insp_end = insp_end.clamp(start, end).min(exp_start);

        PhaseMarkers::new(insp_end, exp_start)
    });

    RefinedBreath { start, end, phases }
}

fn sign(value: f64) -> i8 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

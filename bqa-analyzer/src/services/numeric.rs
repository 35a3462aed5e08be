//! Stateless numeric primitives used per breath
//!
//! All index ranges are inclusive (`[start, end]`). Errors are raised by the
//! primitive that detects them and are never coerced to a default value.
//! Plausibility of results is not judged here.

use bqa_common::{Error, Result};

use crate::models::{PhaseMarkers, SotairAnalysis, SotairParameters};

/// (L/min) * s -> mL
pub const LPM_SECONDS_TO_ML: f64 = 1000.0 / 60.0;

fn ensure_within(len: usize, start: usize, end: usize) -> Result<()> {
    if start > end || end >= len {
        return Err(Error::OutOfRange(format!(
            "[{}, {}] for sequence of length {}",
            start, end, len
        )));
    }
    Ok(())
}

fn ensure_non_empty_slice(len: usize, start: usize, end: usize) -> Result<()> {
    if start >= end {
        return Err(Error::OutOfRange(format!(
            "start {} is not before end {}",
            start, end
        )));
    }
    ensure_within(len, start, end)
}

/// Integrate flow over time with the trapezoidal rule
///
/// Returns volume in mL. A single-sample range (`start == end`) integrates to
/// zero. Time must be strictly increasing across the range and every flow
/// sample must be finite.
pub fn calculate_volume(time: &[f64], flow: &[f64], start: usize, end: usize) -> Result<f64> {
    if time.len() != flow.len() {
        return Err(Error::MalformedInput(format!(
            "time and flow lengths differ ({} vs {})",
            time.len(),
            flow.len()
        )));
    }
    ensure_within(time.len(), start, end)?;

    if !flow[start].is_finite() {
        return Err(Error::MalformedInput(format!(
            "non-finite flow at index {}",
            start
        )));
    }

    let mut area = 0.0;
    for k in start..end {
        let dt = time[k + 1] - time[k];
        if !(dt > 0.0) {
            return Err(Error::MalformedInput(format!(
                "time not strictly increasing between index {} and {}",
                k,
                k + 1
            )));
        }
        if !flow[k + 1].is_finite() {
            return Err(Error::MalformedInput(format!(
                "non-finite flow at index {}",
                k + 1
            )));
        }
        area += 0.5 * (flow[k] + flow[k + 1]) * dt;
    }

    Ok(area * LPM_SECONDS_TO_ML)
}

fn finite_slice(data: &[f64], start: usize, end: usize) -> Result<&[f64]> {
    ensure_non_empty_slice(data.len(), start, end)?;
    let slice = &data[start..=end];
    if let Some(offset) = slice.iter().position(|v| !v.is_finite()) {
        return Err(Error::MalformedInput(format!(
            "non-finite value at index {}",
            start + offset
        )));
    }
    Ok(slice)
}

/// Maximum of `data[start..=end]`
pub fn find_max_in_slice(data: &[f64], start: usize, end: usize) -> Result<f64> {
    let slice = finite_slice(data, start, end)?;
    Ok(slice.iter().copied().fold(f64::NEG_INFINITY, f64::max))
}

/// Arithmetic mean of `data[start..=end]`
pub fn calc_mean_in_slice(data: &[f64], start: usize, end: usize) -> Result<f64> {
    let slice = finite_slice(data, start, end)?;
    Ok(slice.iter().sum::<f64>() / slice.len() as f64)
}

/// First index in `[from, to]` where flow is no longer positive
pub fn find_flow_cessation(flow: &[f64], from: usize, to: usize) -> Option<usize> {
    if from > to || to >= flow.len() {
        return None;
    }
    (from..=to).find(|&i| flow[i] <= 0.0)
}

/// Single-breath SOTAIR analysis
///
/// Finds the steepest flow drop across the inspiratory phase
/// `[start, exp_start]` and the time from that drop to expiration start. The
/// breath is SOTAIR-active when the drop is steeper than
/// `gradient_threshold` and the hold that follows is longer than
/// `time_gap_threshold_s`. No state is carried between breaths.
pub fn analyze_sotair_single_breath(
    time: &[f64],
    flow: &[f64],
    start: usize,
    phases: PhaseMarkers,
    end: usize,
    params: &SotairParameters,
) -> Result<SotairAnalysis> {
    if !phases.is_ordered_within(start, end) {
        return Err(Error::InvalidInput(format!(
            "breath indices out of order: start={}, insp_end={}, exp_start={}, end={}",
            start, phases.insp_end, phases.exp_start, end
        )));
    }
    ensure_within(time.len().min(flow.len()), start, end)?;

    let mut steepest: Option<(f64, usize)> = None;
    for k in start..phases.exp_start {
        let dt = time[k + 1] - time[k];
        if !(dt > 0.0) {
            continue;
        }
        let gradient = (flow[k + 1] - flow[k]) / dt;
        if !gradient.is_finite() {
            continue;
        }
        if steepest.map_or(true, |(g, _)| gradient < g) {
            steepest = Some((gradient, k + 1));
        }
    }

    let exp_start_time = time[phases.exp_start];
    let (gradient, time_gap_s) = match steepest {
        Some((g, after_drop)) => (Some(g), exp_start_time - time[after_drop]),
        None => (None, exp_start_time - time[phases.insp_end]),
    };

    let active = gradient.map_or(false, |g| g < params.gradient_threshold)
        && time_gap_s > params.time_gap_threshold_s;

    Ok(SotairAnalysis {
        gradient,
        time_gap_s,
        active,
    })
}

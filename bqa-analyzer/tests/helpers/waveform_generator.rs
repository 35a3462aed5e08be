//! Synthetic Respiratory Waveform Generator
//!
//! Builds piecewise-linear flow and pressure traces from breath shapes and
//! silent gaps, sampled at a fixed rate. The continuous trace stays
//! available through `flow_at` so tests can integrate it independently of
//! the pipeline.

use bqa_analyzer::models::{Recording, RecordingInput, Sample};

/// Shape of one synthetic breath
#[derive(Debug, Clone)]
pub struct BreathShape {
    /// Flow ramps from 0 to `peak_flow` over this time (s)
    pub rise_s: f64,
    /// Inspiratory plateau duration (s)
    pub plateau_s: f64,
    /// Flow ramps from `peak_flow` to `trough_flow` over this time (s)
    pub fall_s: f64,
    /// Flow ramps back from `trough_flow` to 0 over this time (s)
    pub recovery_s: f64,
    pub peak_flow: f64,
    pub trough_flow: f64,
    /// Pressure held during rise and plateau (cmH2O)
    pub peak_pressure: f64,
}

impl Default for BreathShape {
    /// 0 → 3 L/min over 0.3 s, 0.4 s plateau, fall to −2 L/min over 0.3 s
    fn default() -> Self {
        Self {
            rise_s: 0.3,
            plateau_s: 0.4,
            fall_s: 0.3,
            recovery_s: 0.3,
            peak_flow: 3.0,
            trough_flow: -2.0,
            peak_pressure: 5.0,
        }
    }
}

impl BreathShape {
    pub fn with_peak_pressure(mut self, pressure: f64) -> Self {
        self.peak_pressure = pressure;
        self
    }

    pub fn scaled(mut self, factor: f64) -> Self {
        self.peak_flow *= factor;
        self.trough_flow *= factor;
        self
    }

    /// Time from breath onset to the end of the plateau
    pub fn plateau_end_s(&self) -> f64 {
        self.rise_s + self.plateau_s
    }
}

/// Piecewise-linear flow/pressure waveform
#[derive(Debug, Clone)]
pub struct Waveform {
    rate_hz: f64,
    flow: Vec<(f64, f64)>,
    pressure: Vec<(f64, f64)>,
    /// Onset time of each breath added
    pub breath_onsets: Vec<f64>,
}

impl Waveform {
    pub fn new(rate_hz: f64) -> Self {
        Self {
            rate_hz,
            flow: vec![(0.0, 0.0)],
            pressure: vec![(0.0, 0.0)],
            breath_onsets: Vec::new(),
        }
    }

    fn cursor(&self) -> f64 {
        self.flow.last().map(|k| k.0).unwrap_or(0.0)
    }

    /// Zero flow and pressure for `duration_s`
    pub fn silence(mut self, duration_s: f64) -> Self {
        let end = self.cursor() + duration_s;
        self.flow.push((end, 0.0));
        self.pressure.push((end, 0.0));
        self
    }

    pub fn breath(mut self, shape: &BreathShape) -> Self {
        let t0 = self.cursor();
        let t_peak = t0 + shape.rise_s;
        let t_plateau_end = t_peak + shape.plateau_s;
        let t_trough = t_plateau_end + shape.fall_s;
        let t_end = t_trough + shape.recovery_s;

        self.breath_onsets.push(t0);
        self.flow.extend([
            (t_peak, shape.peak_flow),
            (t_plateau_end, shape.peak_flow),
            (t_trough, shape.trough_flow),
            (t_end, 0.0),
        ]);
        self.pressure.extend([
            (t_peak, shape.peak_pressure),
            (t_plateau_end, shape.peak_pressure),
            (t_plateau_end + 0.05, 0.0),
            (t_end, 0.0),
        ]);
        self
    }

    pub fn duration_s(&self) -> f64 {
        self.cursor()
    }

    pub fn flow_at(&self, t: f64) -> f64 {
        interpolate(&self.flow, t)
    }

    pub fn pressure_at(&self, t: f64) -> f64 {
        interpolate(&self.pressure, t)
    }

    fn sample_times(&self) -> Vec<f64> {
        let n = (self.duration_s() * self.rate_hz).round() as usize + 1;
        (0..n).map(|k| k as f64 / self.rate_hz).collect()
    }

    pub fn to_recording(&self) -> Recording {
        Recording::from_samples(
            self.sample_times()
                .into_iter()
                .map(|t| Sample::new(t, self.flow_at(t), self.pressure_at(t))),
        )
        .expect("synthetic recording is well formed")
    }

    /// JSON hand-off form of the sampled waveform
    pub fn to_input(&self) -> RecordingInput {
        let times = self.sample_times();
        RecordingInput {
            started_at: None,
            device_untrusted: false,
            flow: Some(times.iter().map(|&t| Some(self.flow_at(t))).collect()),
            pressure: Some(times.iter().map(|&t| Some(self.pressure_at(t))).collect()),
            time: Some(times.into_iter().map(Some).collect()),
        }
    }

    /// Reference flow integral over `[from, to]` in mL, by fine midpoint rule
    /// on the continuous trace
    pub fn reference_volume_ml(&self, from: f64, to: f64) -> f64 {
        let steps = 100_000;
        let h = (to - from) / steps as f64;
        let area: f64 = (0..steps)
            .map(|i| self.flow_at(from + (i as f64 + 0.5) * h) * h)
            .sum();
        area * 1000.0 / 60.0
    }
}

fn interpolate(knots: &[(f64, f64)], t: f64) -> f64 {
    for pair in knots.windows(2) {
        let (t0, v0) = pair[0];
        let (t1, v1) = pair[1];
        if t < t1 && t1 > t0 {
            if t <= t0 {
                return v0;
            }
            return v0 + (v1 - v0) * (t - t0) / (t1 - t0);
        }
    }
    knots.last().map(|k| k.1).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolation() {
        let wave = Waveform::new(100.0).silence(0.5).breath(&BreathShape::default());
        assert_eq!(wave.flow_at(0.25), 0.0);
        assert!((wave.flow_at(0.65) - 1.5).abs() < 1e-9);
        assert_eq!(wave.flow_at(1.0), 3.0);
        assert!((wave.duration_s() - 1.8).abs() < 1e-9);
    }

    #[test]
    fn test_reference_volume() {
        let wave = Waveform::new(100.0).breath(&BreathShape::default());
        // Triangle 0.3 s * 3 / 2 plus plateau 0.4 s * 3, in L/min*s
        let expected = (0.45 + 1.2) * 1000.0 / 60.0;
        assert!((wave.reference_volume_ml(0.0, 0.7) - expected).abs() < 1e-3);
    }
}

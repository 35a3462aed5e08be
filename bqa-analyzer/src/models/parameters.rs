//! Breath detection, refinement and QA validation parameters
//!
//! Every field carries a serde default so that a TOML file or a caller can
//! override any subset of values. A `QaParameters` value is immutable for the
//! duration of one pipeline run.
//!
//! Windows are given in seconds and converted to sample counts per recording
//! from its median sample interval, so the same parameters apply at any
//! sample rate.

use bqa_common::time::seconds_to_samples;
use bqa_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Complete parameter set for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct QaParameters {
    /// Breath boundary detection thresholds
    #[serde(default)]
    pub detection: DetectionParameters,

    /// Inspiration-end / expiration-start detection
    #[serde(default)]
    pub phases: PhaseParameters,

    /// Zero-crossing refinement
    #[serde(default)]
    pub refinement: RefinementParameters,

    /// SOTAIR detector thresholds
    #[serde(default)]
    pub sotair: SotairParameters,

    /// QA plausibility bounds
    #[serde(default)]
    pub validation: ValidationParameters,
}

impl QaParameters {
    /// Check internal consistency of all sections
    pub fn validate(&self) -> Result<()> {
        self.detection.validate()?;
        self.phases.validate()?;
        self.validation.validate()?;
        if !(self.refinement.zero_crossing_radius_s >= 0.0) {
            return Err(Error::Config(
                "refinement.zero_crossing_radius_s must be >= 0".to_string(),
            ));
        }
        if self.sotair.time_gap_threshold_s < 0.0 {
            return Err(Error::Config(
                "sotair.time_gap_threshold_s must be >= 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Render the effective parameters as TOML (for audit trails)
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to render parameters: {}", e)))
    }
}

/// How detection thresholds are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMode {
    /// Thresholds are absolute values in L/min and cmH2O
    #[default]
    Absolute,
    /// Thresholds are fractions of the recording's maximum flow / pressure
    RelativeToPeak,
}

/// A (low, high) flow band in L/min
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlowBand {
    pub low: f64,
    pub high: f64,
}

impl FlowBand {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    fn scaled(&self, factor: f64) -> Self {
        Self::new(self.low * factor, self.high * factor)
    }
}

/// Breath boundary detection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionParameters {
    /// Absolute thresholds or fractions of recording peak (default: absolute)
    #[serde(default)]
    pub threshold_mode: ThresholdMode,

    /// Start band: flow rises above `low`, confirmed by a peak above `high` (default: 1.0 / 2.0 L/min)
    #[serde(default = "default_positive_flow_band")]
    pub positive_flow_band: FlowBand,

    /// Pressure that must be exceeded while a start is confirmed (default: 1.0 cmH2O)
    #[serde(default = "default_start_pressure_min")]
    pub start_pressure_min: f64,

    /// Expiration band magnitudes: flow falls below `-low`, reaching below `-high` (default: 0.5 / 1.0 L/min)
    #[serde(default = "default_negative_flow_band")]
    pub negative_flow_band: FlowBand,

    /// Pressure must stay below this while expiration is confirmed (default: 0.5 cmH2O)
    #[serde(default = "default_end_pressure_max")]
    pub end_pressure_max: f64,

    /// Forward confirmation window (default: 0.2s)
    #[serde(default = "default_confirm_window_s")]
    pub confirm_window_s: f64,

    /// Time after a start before expiration may be detected (default: 0.4s)
    #[serde(default = "default_min_breath_separation_s")]
    pub min_breath_separation_s: f64,

    /// Minimum breath duration in seconds (default: 0.2s)
    #[serde(default = "default_min_breath_duration_s")]
    pub min_breath_duration_s: f64,

    /// Fractions of recording peak used in `relative_to_peak` mode
    #[serde(default)]
    pub relative: RelativeThresholds,
}

impl DetectionParameters {
    fn validate(&self) -> Result<()> {
        for (name, band) in [
            ("positive_flow_band", self.positive_flow_band),
            ("negative_flow_band", self.negative_flow_band),
        ] {
            if band.low < 0.0 || band.low > band.high {
                return Err(Error::Config(format!(
                    "detection.{} must satisfy 0 <= low <= high (got {} / {})",
                    name, band.low, band.high
                )));
            }
        }
        if !(self.confirm_window_s > 0.0) {
            return Err(Error::Config(
                "detection.confirm_window_s must be > 0".to_string(),
            ));
        }
        if !(self.min_breath_separation_s >= 0.0) {
            return Err(Error::Config(
                "detection.min_breath_separation_s must be >= 0".to_string(),
            ));
        }
        if !(self.min_breath_duration_s >= 0.0) {
            return Err(Error::Config(
                "detection.min_breath_duration_s must be >= 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Sample counts of the detection windows at `interval_s`
    ///
    /// Without a usable interval every window falls back to its minimum.
    pub fn windows(&self, interval_s: Option<f64>) -> DetectionWindows {
        DetectionWindows {
            confirm: to_samples(self.confirm_window_s, interval_s).max(1),
            separation: to_samples(self.min_breath_separation_s, interval_s),
        }
    }

    /// Resolve effective absolute thresholds for a recording
    ///
    /// `max_flow` / `max_pressure` are the recording maxima over finite
    /// samples; they are only consulted in `relative_to_peak` mode.
    pub fn resolve(&self, max_flow: f64, max_pressure: f64) -> ResolvedThresholds {
        match self.threshold_mode {
            ThresholdMode::Absolute => ResolvedThresholds {
                positive_flow_band: self.positive_flow_band,
                start_pressure_min: self.start_pressure_min,
                negative_flow_band: self.negative_flow_band,
                end_pressure_max: self.end_pressure_max,
            },
            ThresholdMode::RelativeToPeak => ResolvedThresholds {
                positive_flow_band: self.relative.positive_flow_band.scaled(max_flow),
                start_pressure_min: self.relative.start_pressure * max_pressure,
                negative_flow_band: self.relative.negative_flow_band.scaled(max_flow),
                end_pressure_max: self.relative.end_pressure * max_pressure,
            },
        }
    }
}

impl Default for DetectionParameters {
    fn default() -> Self {
        Self {
            threshold_mode: ThresholdMode::default(),
            positive_flow_band: default_positive_flow_band(),
            start_pressure_min: default_start_pressure_min(),
            negative_flow_band: default_negative_flow_band(),
            end_pressure_max: default_end_pressure_max(),
            confirm_window_s: default_confirm_window_s(),
            min_breath_separation_s: default_min_breath_separation_s(),
            min_breath_duration_s: default_min_breath_duration_s(),
            relative: RelativeThresholds::default(),
        }
    }
}

/// Detection windows resolved to samples for one recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionWindows {
    pub confirm: usize,
    pub separation: usize,
}

/// Detection thresholds after mode resolution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedThresholds {
    pub positive_flow_band: FlowBand,
    pub start_pressure_min: f64,
    pub negative_flow_band: FlowBand,
    pub end_pressure_max: f64,
}

/// Fractions of recording maxima for adaptive thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelativeThresholds {
    /// Fractions of max flow (default: 0.05 / 0.20)
    #[serde(default = "default_relative_positive_band")]
    pub positive_flow_band: FlowBand,

    /// Fraction of max pressure (default: 0.10)
    #[serde(default = "default_relative_start_pressure")]
    pub start_pressure: f64,

    /// Fractions of max flow (default: 0.05 / 0.10)
    #[serde(default = "default_relative_negative_band")]
    pub negative_flow_band: FlowBand,

    /// Fraction of max pressure (default: 0.05)
    #[serde(default = "default_relative_end_pressure")]
    pub end_pressure: f64,
}

impl Default for RelativeThresholds {
    fn default() -> Self {
        Self {
            positive_flow_band: default_relative_positive_band(),
            start_pressure: default_relative_start_pressure(),
            negative_flow_band: default_relative_negative_band(),
            end_pressure: default_relative_end_pressure(),
        }
    }
}

/// Breath phase detection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseParameters {
    /// Time skipped after the start before the plateau search (default: 0.21s)
    #[serde(default = "default_insp_end_skip_s")]
    pub insp_end_skip_s: f64,

    /// Trailing plateau window, at least three samples (default: 0.05s)
    #[serde(default = "default_plateau_window_s")]
    pub plateau_window_s: f64,

    /// Maximum population variance of a plateau window, (L/min)^2 (default: 0.05)
    #[serde(default = "default_plateau_variance_threshold")]
    pub plateau_variance_threshold: f64,

    /// Maximum least-squares flow change across a plateau window, L/min (default: 0.25)
    #[serde(default = "default_plateau_drift_threshold")]
    pub plateau_drift_threshold: f64,

    /// Plateau window mean must reach this fraction of peak flow (default: 0.8)
    #[serde(default = "default_plateau_peak_fraction")]
    pub plateau_peak_fraction: f64,

    /// Negative flow threshold marking expiration start (default: -1.0 L/min)
    #[serde(default = "default_exp_start_flow_threshold")]
    pub exp_start_flow_threshold: f64,

    /// Time flow must stay below the threshold (default: 0.05s)
    #[serde(default = "default_exp_start_confirm_s")]
    pub exp_start_confirm_s: f64,
}

/// Phase detection windows resolved to samples for one recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseWindows {
    pub insp_end_skip: usize,
    pub plateau: usize,
    pub exp_start_confirm: usize,
}

impl PhaseParameters {
    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("plateau_window_s", self.plateau_window_s),
            ("exp_start_confirm_s", self.exp_start_confirm_s),
        ] {
            if !(value > 0.0) {
                return Err(Error::Config(format!("phases.{} must be > 0", name)));
            }
        }
        for (name, value) in [
            ("insp_end_skip_s", self.insp_end_skip_s),
            ("plateau_variance_threshold", self.plateau_variance_threshold),
            ("plateau_drift_threshold", self.plateau_drift_threshold),
        ] {
            if !(value >= 0.0) {
                return Err(Error::Config(format!("phases.{} must be >= 0", name)));
            }
        }
        if self.exp_start_flow_threshold >= 0.0 {
            return Err(Error::Config(
                "phases.exp_start_flow_threshold must be negative".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.plateau_peak_fraction) {
            return Err(Error::Config(
                "phases.plateau_peak_fraction must be within [0, 1]".to_string(),
            ));
        }
        Ok(())
    }

    /// Sample counts of the phase windows at `interval_s`
    pub fn windows(&self, interval_s: Option<f64>) -> PhaseWindows {
        PhaseWindows {
            insp_end_skip: to_samples(self.insp_end_skip_s, interval_s),
            plateau: to_samples(self.plateau_window_s, interval_s).max(3),
            exp_start_confirm: to_samples(self.exp_start_confirm_s, interval_s).max(1),
        }
    }
}

impl Default for PhaseParameters {
    fn default() -> Self {
        Self {
            insp_end_skip_s: default_insp_end_skip_s(),
            plateau_window_s: default_plateau_window_s(),
            plateau_variance_threshold: default_plateau_variance_threshold(),
            plateau_drift_threshold: default_plateau_drift_threshold(),
            plateau_peak_fraction: default_plateau_peak_fraction(),
            exp_start_flow_threshold: default_exp_start_flow_threshold(),
            exp_start_confirm_s: default_exp_start_confirm_s(),
        }
    }
}

/// Zero-crossing refinement parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementParameters {
    /// Search radius around each raw boundary (default: 0.2s)
    #[serde(default = "default_zero_crossing_radius_s")]
    pub zero_crossing_radius_s: f64,
}

impl RefinementParameters {
    /// Search radius in samples at `interval_s`
    pub fn radius(&self, interval_s: Option<f64>) -> usize {
        to_samples(self.zero_crossing_radius_s, interval_s)
    }
}

impl Default for RefinementParameters {
    fn default() -> Self {
        Self {
            zero_crossing_radius_s: default_zero_crossing_radius_s(),
        }
    }
}

/// SOTAIR (sustained opening of the airway) detector parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SotairParameters {
    /// Flow gradient that counts as an abrupt cut-off, L/min/s (default: -1000)
    #[serde(default = "default_sotair_gradient_threshold")]
    pub gradient_threshold: f64,

    /// Minimum hold between cut-off and expiration in seconds (default: 0.25s)
    #[serde(default = "default_sotair_time_gap_threshold_s")]
    pub time_gap_threshold_s: f64,
}

impl Default for SotairParameters {
    fn default() -> Self {
        Self {
            gradient_threshold: default_sotair_gradient_threshold(),
            time_gap_threshold_s: default_sotair_time_gap_threshold_s(),
        }
    }
}

/// QA plausibility bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationParameters {
    /// Minimum inhaled tidal volume in mL (default: 50)
    #[serde(default = "default_min_inspiratory_volume_ml")]
    pub min_inspiratory_volume_ml: f64,

    /// Maximum exhaled tidal volume in mL (default: 2000)
    #[serde(default = "default_max_expiratory_volume_ml")]
    pub max_expiratory_volume_ml: f64,

    /// Peak pressure range in cmH2O (default: 0.1 - 100)
    #[serde(default = "default_min_peak_pressure")]
    pub min_peak_pressure: f64,
    #[serde(default = "default_max_peak_pressure")]
    pub max_peak_pressure: f64,

    /// Peak flow range in L/min (default: 1 - 200)
    #[serde(default = "default_min_peak_flow")]
    pub min_peak_flow: f64,
    #[serde(default = "default_max_peak_flow")]
    pub max_peak_flow: f64,

    /// Inspiratory time range in seconds (default: 0.1 - 10)
    #[serde(default = "default_min_inspiratory_time_s")]
    pub min_inspiratory_time_s: f64,
    #[serde(default = "default_max_inspiratory_time_s")]
    pub max_inspiratory_time_s: f64,
}

impl ValidationParameters {
    fn validate(&self) -> Result<()> {
        for (name, min, max) in [
            ("peak_pressure", self.min_peak_pressure, self.max_peak_pressure),
            ("peak_flow", self.min_peak_flow, self.max_peak_flow),
            (
                "inspiratory_time_s",
                self.min_inspiratory_time_s,
                self.max_inspiratory_time_s,
            ),
        ] {
            if min > max {
                return Err(Error::Config(format!(
                    "validation.min_{} ({}) exceeds validation.max_{} ({})",
                    name, min, name, max
                )));
            }
        }
        Ok(())
    }
}

impl Default for ValidationParameters {
    fn default() -> Self {
        Self {
            min_inspiratory_volume_ml: default_min_inspiratory_volume_ml(),
            max_expiratory_volume_ml: default_max_expiratory_volume_ml(),
            min_peak_pressure: default_min_peak_pressure(),
            max_peak_pressure: default_max_peak_pressure(),
            min_peak_flow: default_min_peak_flow(),
            max_peak_flow: default_max_peak_flow(),
            min_inspiratory_time_s: default_min_inspiratory_time_s(),
            max_inspiratory_time_s: default_max_inspiratory_time_s(),
        }
    }
}

fn to_samples(seconds: f64, interval_s: Option<f64>) -> usize {
    interval_s.map_or(0, |dt| seconds_to_samples(seconds, dt))
}

// Default value functions
fn default_positive_flow_band() -> FlowBand {
    FlowBand::new(1.0, 2.0)
}

fn default_start_pressure_min() -> f64 {
    1.0
}

fn default_negative_flow_band() -> FlowBand {
    FlowBand::new(0.5, 1.0)
}

fn default_end_pressure_max() -> f64 {
    0.5
}

fn default_confirm_window_s() -> f64 {
    0.2
}

fn default_min_breath_separation_s() -> f64 {
    0.4
}

fn default_min_breath_duration_s() -> f64 {
    0.2
}

fn default_relative_positive_band() -> FlowBand {
    FlowBand::new(0.05, 0.20)
}

fn default_relative_start_pressure() -> f64 {
    0.10
}

fn default_relative_negative_band() -> FlowBand {
    FlowBand::new(0.05, 0.10)
}

fn default_relative_end_pressure() -> f64 {
    0.05
}

fn default_insp_end_skip_s() -> f64 {
    0.21
}

fn default_plateau_window_s() -> f64 {
    0.05
}

fn default_plateau_variance_threshold() -> f64 {
    0.05
}

fn default_plateau_drift_threshold() -> f64 {
    0.25
}

fn default_plateau_peak_fraction() -> f64 {
    0.8
}

fn default_exp_start_flow_threshold() -> f64 {
    -1.0
}

fn default_exp_start_confirm_s() -> f64 {
    0.05
}

fn default_zero_crossing_radius_s() -> f64 {
    0.2
}

fn default_sotair_gradient_threshold() -> f64 {
    -1000.0
}

fn default_sotair_time_gap_threshold_s() -> f64 {
    0.25
}

fn default_min_inspiratory_volume_ml() -> f64 {
    50.0
}

fn default_max_expiratory_volume_ml() -> f64 {
    2000.0
}

fn default_min_peak_pressure() -> f64 {
    0.1
}

fn default_max_peak_pressure() -> f64 {
    100.0
}

fn default_min_peak_flow() -> f64 {
    1.0
}

fn default_max_peak_flow() -> f64 {
    200.0
}

fn default_min_inspiratory_time_s() -> f64 {
    0.1
}

fn default_max_inspiratory_time_s() -> f64 {
    10.0
}

//! Plausibility Validator
//!
//! Rejects QA table rows whose metrics fall outside physiological bounds.
//!
//! # Checks
//! 1. **Completeness**: every metric is present and finite
//! 2. **Timing**: end time follows start time
//! 3. **Volumes**: inhaled volume positive and above minimum, exhaled volume
//!    positive and below maximum
//! 4. **Peaks**: peak pressure and peak flow within range
//! 5. **Inspiratory time**: positive and within range
//!
//! Every failing check is reported for a row, not just the first one.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use crate::models::{BreathRecord, QaTable, ValidationParameters};

/// Metric named in a drop reason
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    InspirationEndTime,
    ExpirationStartTime,
    PeakPressure,
    PeakFlow,
    InhaledVolume,
    ExhaledVolume,
    InspiratoryTime,
    InspiratoryFlowTime,
    MeanInspiratoryPressure,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::InspirationEndTime => "inspiration end time",
            Metric::ExpirationStartTime => "expiration start time",
            Metric::PeakPressure => "peak pressure",
            Metric::PeakFlow => "peak flow",
            Metric::InhaledVolume => "inhaled volume",
            Metric::ExhaledVolume => "exhaled volume",
            Metric::InspiratoryTime => "inspiratory time",
            Metric::InspiratoryFlowTime => "inspiratory flow time",
            Metric::MeanInspiratoryPressure => "mean inspiratory pressure",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a row was removed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DropReason {
    /// Metric absent or not a finite number
    MissingValue { metric: Metric },
    /// Metric must be strictly positive
    NonPositive { metric: Metric, value: f64 },
    BelowMinimum { metric: Metric, value: f64, min: f64 },
    AboveMaximum { metric: Metric, value: f64, max: f64 },
    /// End time does not follow start time
    InvalidTiming { start_time_s: f64, end_time_s: f64 },
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::MissingValue { metric } => write!(f, "{} missing", metric),
            DropReason::NonPositive { metric, value } => {
                write!(f, "{} {} is not positive", metric, value)
            }
            DropReason::BelowMinimum { metric, value, min } => {
                write!(f, "{} {} below minimum {}", metric, value, min)
            }
            DropReason::AboveMaximum { metric, value, max } => {
                write!(f, "{} {} above maximum {}", metric, value, max)
            }
            DropReason::InvalidTiming {
                start_time_s,
                end_time_s,
            } => write!(
                f,
                "end time {}s does not follow start time {}s",
                end_time_s, start_time_s
            ),
        }
    }
}

/// A removed row and every check it failed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedBreath {
    pub breath_number: u32,
    pub reasons: Vec<DropReason>,
}

/// Summary of one table check
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct QaCheckReport {
    pub input_breaths: usize,
    pub kept_breaths: usize,
    pub dropped: Vec<DroppedBreath>,
}

impl QaCheckReport {
    pub fn dropped_count(&self) -> usize {
        self.dropped.len()
    }

    /// Reasons recorded for a dropped breath
    pub fn reasons_for(&self, breath_number: u32) -> Option<&[DropReason]> {
        self.dropped
            .iter()
            .find(|d| d.breath_number == breath_number)
            .map(|d| d.reasons.as_slice())
    }
}

/// Filtered table plus the report explaining what was removed
#[derive(Debug, Clone, PartialEq)]
pub struct QaCheckOutcome {
    pub table: QaTable,
    pub report: QaCheckReport,
}

/// Plausibility Validator
pub struct PlausibilityValidator {
    bounds: ValidationParameters,
}

impl PlausibilityValidator {
    pub fn new(bounds: ValidationParameters) -> Self {
        Self { bounds }
    }

    /// All reasons a row fails; empty when the row is plausible
    pub fn validate_record(&self, record: &BreathRecord) -> Vec<DropReason> {
        let b = &self.bounds;
        let mut reasons = Vec::new();

        if !(record.end_time_s > record.start_time_s) {
            reasons.push(DropReason::InvalidTiming {
                start_time_s: record.start_time_s,
                end_time_s: record.end_time_s,
            });
        }

        require(&mut reasons, Metric::InspirationEndTime, record.insp_end_time_s);
        require(&mut reasons, Metric::ExpirationStartTime, record.exp_start_time_s);

        if let Some(v) = require(&mut reasons, Metric::InhaledVolume, record.inhaled_volume_ml) {
            if v <= 0.0 {
                reasons.push(DropReason::NonPositive {
                    metric: Metric::InhaledVolume,
                    value: v,
                });
            } else if v < b.min_inspiratory_volume_ml {
                reasons.push(DropReason::BelowMinimum {
                    metric: Metric::InhaledVolume,
                    value: v,
                    min: b.min_inspiratory_volume_ml,
                });
            }
        }

        if let Some(v) = require(&mut reasons, Metric::ExhaledVolume, record.exhaled_volume_ml) {
            if v <= 0.0 {
                reasons.push(DropReason::NonPositive {
                    metric: Metric::ExhaledVolume,
                    value: v,
                });
            } else if v > b.max_expiratory_volume_ml {
                reasons.push(DropReason::AboveMaximum {
                    metric: Metric::ExhaledVolume,
                    value: v,
                    max: b.max_expiratory_volume_ml,
                });
            }
        }

        if let Some(v) = require(&mut reasons, Metric::PeakPressure, record.peak_pressure_cmh2o) {
            check_range(
                &mut reasons,
                Metric::PeakPressure,
                v,
                b.min_peak_pressure,
                b.max_peak_pressure,
            );
        }

        if let Some(v) = require(&mut reasons, Metric::PeakFlow, record.peak_flow_lpm) {
            check_range(&mut reasons, Metric::PeakFlow, v, b.min_peak_flow, b.max_peak_flow);
        }

        if let Some(v) = require(&mut reasons, Metric::InspiratoryTime, record.inspiratory_time_s) {
            if v <= 0.0 {
                reasons.push(DropReason::NonPositive {
                    metric: Metric::InspiratoryTime,
                    value: v,
                });
            } else {
                check_range(
                    &mut reasons,
                    Metric::InspiratoryTime,
                    v,
                    b.min_inspiratory_time_s,
                    b.max_inspiratory_time_s,
                );
            }
        }

        require(
            &mut reasons,
            Metric::InspiratoryFlowTime,
            record.inspiratory_flow_time_s,
        );
        require(
            &mut reasons,
            Metric::MeanInspiratoryPressure,
            record.mean_inspiratory_pressure_cmh2o,
        );

        reasons
    }

    /// Remove implausible rows
    ///
    /// Kept rows are returned unchanged and keep their breath numbers; gaps
    /// in numbering mark removed rows.
    pub fn check(&self, table: &QaTable) -> QaCheckOutcome {
        let mut kept = Vec::with_capacity(table.len());
        let mut dropped = Vec::new();

        for record in table {
            let reasons = self.validate_record(record);
            if reasons.is_empty() {
                kept.push(record.clone());
            } else {
                debug!(
                    breath = record.breath_number,
                    reasons = %join_reasons(&reasons),
                    "Dropping implausible breath"
                );
                dropped.push(DroppedBreath {
                    breath_number: record.breath_number,
                    reasons,
                });
            }
        }

        let report = QaCheckReport {
            input_breaths: table.len(),
            kept_breaths: kept.len(),
            dropped,
        };
        info!(
            input = report.input_breaths,
            kept = report.kept_breaths,
            dropped = report.dropped_count(),
            "QA check complete"
        );

        QaCheckOutcome {
            table: QaTable::new(kept),
            report,
        }
    }
}

impl Default for PlausibilityValidator {
    fn default() -> Self {
        Self::new(ValidationParameters::default())
    }
}

/// Remove implausible rows from a QA table
pub fn check_qa_table(table: &QaTable, bounds: &ValidationParameters) -> QaCheckOutcome {
    PlausibilityValidator::new(bounds.clone()).check(table)
}

fn require(reasons: &mut Vec<DropReason>, metric: Metric, value: Option<f64>) -> Option<f64> {
    match value {
        Some(v) if v.is_finite() => Some(v),
        _ => {
            reasons.push(DropReason::MissingValue { metric });
            None
        }
    }
}

fn check_range(reasons: &mut Vec<DropReason>, metric: Metric, value: f64, min: f64, max: f64) {
    if value < min {
        reasons.push(DropReason::BelowMinimum { metric, value, min });
    } else if value > max {
        reasons.push(DropReason::AboveMaximum { metric, value, max });
    }
}

fn join_reasons(reasons: &[DropReason]) -> String {
    reasons
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

//! QA pipeline
//!
//! Orchestrates detection → phase detection → boundary refinement → metric
//! extraction into a QA table, and exposes the plausibility check and the
//! user-guided re-segmentation of individual breaths.
//!
//! A `QaPipeline` owns an immutable parameter set. Independent recordings
//! may be processed concurrently by separate pipeline instances.

use std::collections::BTreeMap;

use bqa_common::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::models::{
    BreathCandidate, BreathRecord, QaParameters, QaTable, Recording, RefinedBreath,
};
use crate::services::boundary_refiner;
use crate::services::breath_detector::detect_breaths;
use crate::services::numeric::{
    analyze_sotair_single_breath, calc_mean_in_slice, calculate_volume, find_flow_cessation,
    find_max_in_slice,
};
use crate::services::phase_detector::{detect_breath_phases, detect_single_breath_phases};
use crate::validators::{PlausibilityValidator, QaCheckOutcome, QaCheckReport};

/// Replacement boundaries for one breath during user-guided refinement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum BoundaryOverride {
    /// Sample indices, inclusive
    Indices { start: usize, end: usize },
    /// Times in seconds, resolved to the nearest sample
    Times { start_s: f64, end_s: f64 },
}

impl BoundaryOverride {
    /// Resolve to a candidate within `recording`
    pub fn resolve(&self, recording: &Recording) -> Result<BreathCandidate> {
        let (start, end) = match *self {
            BoundaryOverride::Indices { start, end } => (start, end),
            BoundaryOverride::Times { start_s, end_s } => {
                let start = recording.nearest_index(start_s).ok_or_else(|| {
                    Error::InvalidInput(format!("no sample near start time {}", start_s))
                })?;
                let end = recording.nearest_index(end_s).ok_or_else(|| {
                    Error::InvalidInput(format!("no sample near end time {}", end_s))
                })?;
                (start, end)
            }
        };

        if start >= end || end >= recording.len() {
            return Err(Error::InvalidInput(format!(
                "override boundaries [{}, {}] invalid for recording of {} samples",
                start,
                end,
                recording.len()
            )));
        }
        Ok(BreathCandidate::new(start, end))
    }
}

/// Raw table, cleaned table and check report for one recording
#[derive(Debug, Clone, PartialEq)]
pub struct QaRun {
    pub raw: QaTable,
    pub cleaned: QaTable,
    pub report: QaCheckReport,
}

/// Breath segmentation and QA pipeline
#[derive(Debug, Default)]
pub struct QaPipeline {
    params: QaParameters,
}

impl QaPipeline {
    /// Create a pipeline; inconsistent parameters are rejected
    pub fn new(params: QaParameters) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn parameters(&self) -> &QaParameters {
        &self.params
    }

    /// Segment a recording and compute per-breath metrics
    ///
    /// Breaths whose metrics cannot be computed are skipped with a warning;
    /// the remaining rows are numbered from 1 in detection order.
    pub fn generate_qa_breath_table(&self, recording: &Recording) -> Result<QaTable> {
        if recording.device_untrusted() {
            warn!("Recording comes from an untrusted device format; results may be unreliable");
        }

        let candidates = detect_breaths(recording, &self.params.detection)?;
        let phases = detect_breath_phases(recording, &candidates, &self.params.phases);
        let refined = boundary_refiner::refine_breath_detection(
            recording,
            &candidates,
            &phases,
            &self.params.refinement,
        );

        let mut records: Vec<BreathRecord> = Vec::with_capacity(refined.len());
        for (index, breath) in refined.iter().enumerate() {
            let breath_number = next_breath_number(records.len())?;
            match self.compute_record(recording, breath_number, breath) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    candidate = index,
                    start = breath.start,
                    end = breath.end,
                    error = %e,
                    "Skipping breath: metric extraction failed"
                ),
            }
        }

        info!(
            candidates = candidates.len(),
            breaths = records.len(),
            "QA table generated"
        );
        Ok(QaTable::new(records))
    }

    /// Remove implausible rows from a table
    pub fn check_qa_table(&self, table: &QaTable) -> QaCheckOutcome {
        PlausibilityValidator::new(self.params.validation.clone()).check(table)
    }

    /// Re-segment selected breaths with user-supplied boundaries
    ///
    /// Rows not named in `overrides` are carried over unchanged. A named
    /// row whose metrics cannot be recomputed is dropped with a warning.
    /// Naming a breath number absent from the table is an error.
    pub fn refine_breath_detection(
        &self,
        recording: &Recording,
        table: &QaTable,
        overrides: &BTreeMap<u32, BoundaryOverride>,
    ) -> Result<QaTable> {
        if let Some(&missing) = overrides.keys().find(|n| table.get(**n).is_none()) {
            return Err(Error::BreathNotFound(missing));
        }

        let mut records = Vec::with_capacity(table.len());
        for record in table {
            let Some(boundary) = overrides.get(&record.breath_number) else {
                records.push(record.clone());
                continue;
            };

            let candidate = boundary.resolve(recording)?;
            let phases = detect_single_breath_phases(recording, candidate, &self.params.phases);
            // User boundaries are not clamped against neighbouring breaths
            let breath = boundary_refiner::refine_single_breath(
                recording.flow(),
                candidate,
                phases,
                0,
                self.params.refinement.radius(recording.sample_interval_s()),
            );

            match self.compute_record(recording, record.breath_number, &breath) {
                Ok(updated) => {
                    debug!(
                        breath = record.breath_number,
                        start = breath.start,
                        end = breath.end,
                        "Breath re-segmented"
                    );
                    records.push(updated);
                }
                Err(e) => warn!(
                    breath = record.breath_number,
                    error = %e,
                    "Dropping re-segmented breath: metric extraction failed"
                ),
            }
        }

        Ok(QaTable::new(records))
    }

    /// Generate and check in one pass
    pub fn analyze(&self, recording: &Recording) -> Result<QaRun> {
        let raw = self.generate_qa_breath_table(recording)?;
        let QaCheckOutcome { table, report } = self.check_qa_table(&raw);
        Ok(QaRun {
            raw,
            cleaned: table,
            report,
        })
    }

    fn compute_record(
        &self,
        recording: &Recording,
        breath_number: u32,
        breath: &RefinedBreath,
    ) -> Result<BreathRecord> {
        if !breath.is_valid() || breath.end >= recording.len() {
            return Err(Error::InvalidInput(format!(
                "refined boundaries out of order: {:?}",
                breath
            )));
        }

        let time = recording.time();
        let flow = recording.flow();
        let pressure = recording.pressure();
        let (start, end) = (breath.start, breath.end);

        let mut record = BreathRecord {
            breath_number,
            start_time_s: time[start],
            end_time_s: time[end],
            insp_end_time_s: None,
            exp_start_time_s: None,
            start_timestamp: recording.timestamp_at(start),
            end_timestamp: recording.timestamp_at(end),
            peak_pressure_cmh2o: None,
            peak_flow_lpm: None,
            inhaled_volume_ml: None,
            exhaled_volume_ml: None,
            inspiratory_time_s: None,
            inspiratory_flow_time_s: None,
            mean_inspiratory_pressure_cmh2o: None,
            sotair: false,
            sotair_gradient: None,
            sotair_time_gap_s: None,
            bounds: *breath,
        };

        let Some(markers) = breath.phases else {
            record.peak_pressure_cmh2o = Some(find_max_in_slice(pressure, start, end)?);
            record.peak_flow_lpm = Some(find_max_in_slice(flow, start, end)?);
            return Ok(record);
        };

        let exp_start = markers.exp_start;
        // Peaks and means need at least two samples in the inspiratory span
        let insp_span_end = exp_start.max(start + 1).min(end);

        let cessation =
            find_flow_cessation(flow, markers.insp_end, exp_start).unwrap_or(exp_start);
        let sotair = analyze_sotair_single_breath(
            time,
            flow,
            start,
            markers,
            end,
            &self.params.sotair,
        )?;

        record.insp_end_time_s = Some(time[markers.insp_end]);
        record.exp_start_time_s = Some(time[exp_start]);
        record.inhaled_volume_ml = Some(calculate_volume(time, flow, start, exp_start)?);
        record.exhaled_volume_ml = Some(calculate_volume(time, flow, exp_start, end)?.abs());
        record.peak_flow_lpm = Some(find_max_in_slice(flow, start, insp_span_end)?);
        record.peak_pressure_cmh2o = Some(find_max_in_slice(pressure, start, insp_span_end)?);
        record.mean_inspiratory_pressure_cmh2o =
            Some(calc_mean_in_slice(pressure, start, insp_span_end)?);
        record.inspiratory_time_s = Some(time[exp_start] - time[start]);
        record.inspiratory_flow_time_s = Some(time[cessation] - time[start]);
        record.sotair = sotair.active;
        record.sotair_gradient = sotair.gradient;
        record.sotair_time_gap_s = Some(sotair.time_gap_s);

        Ok(record)
    }
}

fn next_breath_number(kept: usize) -> Result<u32> {
    u32::try_from(kept + 1)
        .map_err(|_| Error::OutOfRange(format!("breath count {} exceeds u32", kept + 1)))
}

//! Recording: the fully buffered sample sequence handed over by a loader
//!
//! Channels are stored as named columns. Non-numeric flow/pressure cells are
//! coerced to NaN at construction; rows without a usable time value are
//! dropped. A recording is immutable once built.

use bqa_common::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One synchronized reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Seconds since recording start
    pub time_s: f64,
    /// Flow in L/min
    pub flow_lpm: f64,
    /// Pressure in cmH2O
    pub pressure_cmh2o: f64,
}

impl Sample {
    pub fn new(time_s: f64, flow_lpm: f64, pressure_cmh2o: f64) -> Self {
        Self {
            time_s,
            flow_lpm,
            pressure_cmh2o,
        }
    }
}

/// Validated, column-oriented sample sequence
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    time: Vec<f64>,
    flow: Vec<f64>,
    pressure: Vec<f64>,
    started_at: Option<DateTime<Utc>>,
    device_untrusted: bool,
    sample_interval_s: Option<f64>,
}

impl Recording {
    /// Start building a recording from loader columns
    pub fn builder() -> RecordingBuilder {
        RecordingBuilder::default()
    }

    /// Build directly from already-numeric samples
    pub fn from_samples<I>(samples: I) -> Result<Self>
    where
        I: IntoIterator<Item = Sample>,
    {
        let (mut time, mut flow, mut pressure) = (Vec::new(), Vec::new(), Vec::new());
        for s in samples {
            time.push(Some(s.time_s));
            flow.push(Some(s.flow_lpm));
            pressure.push(Some(s.pressure_cmh2o));
        }
        Self::builder().time(time).flow(flow).pressure(pressure).build()
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Time column in seconds
    pub fn time(&self) -> &[f64] {
        &self.time
    }

    /// Flow column in L/min (NaN marks a coerced non-numeric cell)
    pub fn flow(&self) -> &[f64] {
        &self.flow
    }

    /// Pressure column in cmH2O (NaN marks a coerced non-numeric cell)
    pub fn pressure(&self) -> &[f64] {
        &self.pressure
    }

    pub fn sample(&self, index: usize) -> Option<Sample> {
        if index >= self.len() {
            return None;
        }
        Some(Sample::new(
            self.time[index],
            self.flow[index],
            self.pressure[index],
        ))
    }

    /// Wall-clock start of the recording, when the loader knows it
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Loader flagged the device format as untrusted
    pub fn device_untrusted(&self) -> bool {
        self.device_untrusted
    }

    /// Wall-clock timestamp of a sample
    pub fn timestamp_at(&self, index: usize) -> Option<DateTime<Utc>> {
        let origin = self.started_at?;
        let t = *self.time.get(index)?;
        bqa_common::time::offset_timestamp(origin, t)
    }

    /// Median spacing between successive distinct sample times
    ///
    /// Time-based windows are converted to sample counts with this value.
    /// `None` when fewer than two distinct times exist.
    pub fn sample_interval_s(&self) -> Option<f64> {
        self.sample_interval_s
    }

    /// Total duration covered by the time column in seconds
    pub fn duration_s(&self) -> f64 {
        match (self.time.first(), self.time.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }

    /// Index of the sample whose time is closest to `time_s`
    ///
    /// Ties resolve to the earlier sample.
    pub fn nearest_index(&self, time_s: f64) -> Option<usize> {
        if self.is_empty() || !time_s.is_finite() {
            return None;
        }
        let upper = self.time.partition_point(|&t| t < time_s);
        if upper == 0 {
            return Some(0);
        }
        if upper >= self.len() {
            return Some(self.len() - 1);
        }
        let before = time_s - self.time[upper - 1];
        let after = self.time[upper] - time_s;
        Some(if before <= after { upper - 1 } else { upper })
    }

    /// Maximum finite flow, or `None` if the channel has no finite value
    pub fn max_flow(&self) -> Option<f64> {
        finite_max(&self.flow)
    }

    /// Maximum finite pressure, or `None` if the channel has no finite value
    pub fn max_pressure(&self) -> Option<f64> {
        finite_max(&self.pressure)
    }
}

fn finite_max(values: &[f64]) -> Option<f64> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
}

/// Builder coercing loader cells into a `Recording`
#[derive(Debug, Default, Clone)]
pub struct RecordingBuilder {
    time: Option<Vec<Option<f64>>>,
    flow: Option<Vec<Option<f64>>>,
    pressure: Option<Vec<Option<f64>>>,
    started_at: Option<DateTime<Utc>>,
    device_untrusted: bool,
}

impl RecordingBuilder {
    /// Time column in seconds; `None` cells mark non-numeric entries
    pub fn time(mut self, values: Vec<Option<f64>>) -> Self {
        self.time = Some(values);
        self
    }

    /// Flow column in L/min; `None` cells mark non-numeric entries
    pub fn flow(mut self, values: Vec<Option<f64>>) -> Self {
        self.flow = Some(values);
        self
    }

    /// Pressure column in cmH2O; `None` cells mark non-numeric entries
    pub fn pressure(mut self, values: Vec<Option<f64>>) -> Self {
        self.pressure = Some(values);
        self
    }

    pub fn started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = Some(started_at);
        self
    }

    pub fn device_untrusted(mut self, untrusted: bool) -> Self {
        self.device_untrusted = untrusted;
        self
    }

    /// Validate channel shape and coerce cells
    ///
    /// Errors:
    /// - `MissingChannel` if time, flow or pressure was never supplied
    /// - `MalformedInput` if column lengths differ or time decreases
    pub fn build(self) -> Result<Recording> {
        let time = self
            .time
            .ok_or_else(|| Error::MissingChannel("time".to_string()))?;
        let flow = self
            .flow
            .ok_or_else(|| Error::MissingChannel("flow".to_string()))?;
        let pressure = self
            .pressure
            .ok_or_else(|| Error::MissingChannel("pressure".to_string()))?;

        if time.len() != flow.len() || time.len() != pressure.len() {
            return Err(Error::MalformedInput(format!(
                "Channel lengths differ: time={}, flow={}, pressure={}",
                time.len(),
                flow.len(),
                pressure.len()
            )));
        }

        let mut recording = Recording {
            time: Vec::with_capacity(time.len()),
            flow: Vec::with_capacity(time.len()),
            pressure: Vec::with_capacity(time.len()),
            started_at: self.started_at,
            device_untrusted: self.device_untrusted,
            sample_interval_s: None,
        };

        let mut dropped_rows = 0usize;
        let mut coerced_cells = 0usize;

        for ((t, f), p) in time.into_iter().zip(flow).zip(pressure) {
            let t = match t.filter(|t| t.is_finite()) {
                Some(t) => t,
                None => {
                    dropped_rows += 1;
                    continue;
                }
            };

            if let Some(&prev) = recording.time.last() {
                if t < prev {
                    return Err(Error::MalformedInput(format!(
                        "Time decreases at row {}: {} < {}",
                        recording.time.len() + dropped_rows,
                        t,
                        prev
                    )));
                }
            }

            let f = coerce(f, &mut coerced_cells);
            let p = coerce(p, &mut coerced_cells);
            recording.time.push(t);
            recording.flow.push(f);
            recording.pressure.push(p);
        }

        if dropped_rows > 0 {
            warn!(dropped_rows, "Dropped rows without a usable time value");
        }
        recording.sample_interval_s = median_interval(&recording.time);
        debug!(
            samples = recording.len(),
            coerced_cells,
            interval_s = ?recording.sample_interval_s,
            "Recording built"
        );

        Ok(recording)
    }
}

fn median_interval(time: &[f64]) -> Option<f64> {
    let mut steps: Vec<f64> = time
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .filter(|dt| *dt > 0.0)
        .collect();
    if steps.is_empty() {
        return None;
    }
    let mid = steps.len() / 2;
    let (_, upper, _) = steps.select_nth_unstable_by(mid, f64::total_cmp);
    let upper = *upper;
    if steps.len() % 2 == 1 {
        return Some(upper);
    }
    let lower = steps[..mid].iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some((lower + upper) / 2.0)
}

fn coerce(cell: Option<f64>, coerced: &mut usize) -> f64 {
    match cell {
        Some(v) if v.is_finite() => v,
        _ => {
            *coerced += 1;
            f64::NAN
        }
    }
}

/// Serialized hand-off format accepted from external loaders
///
/// Every channel is optional so that a missing column surfaces as a
/// `MissingChannel` error rather than a parse failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordingInput {
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub device_untrusted: bool,
    #[serde(default)]
    pub time: Option<Vec<Option<f64>>>,
    #[serde(default)]
    pub flow: Option<Vec<Option<f64>>>,
    #[serde(default)]
    pub pressure: Option<Vec<Option<f64>>>,
}

impl TryFrom<RecordingInput> for Recording {
    type Error = Error;

    fn try_from(input: RecordingInput) -> Result<Self> {
        let mut builder = Recording::builder().device_untrusted(input.device_untrusted);
        if let Some(time) = input.time {
            builder = builder.time(time);
        }
        if let Some(flow) = input.flow {
            builder = builder.flow(flow);
        }
        if let Some(pressure) = input.pressure {
            builder = builder.pressure(pressure);
        }
        if let Some(started_at) = input.started_at {
            builder = builder.started_at(started_at);
        }
        builder.build()
    }
}

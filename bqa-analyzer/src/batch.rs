//! Per-file batch processing: load a recording, analyze, write the report

use std::fs;
use std::path::{Path, PathBuf};

use bqa_common::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::models::{QaParameters, QaTable, Recording, RecordingInput};
use crate::services::{default_volume_ranges, summarize_table, QaPipeline, TableSummary};
use crate::validators::QaCheckReport;

/// Serialized analysis output for one recording
#[derive(Debug, Clone, Serialize)]
pub struct QaReport {
    pub source: PathBuf,
    pub generated_at: DateTime<Utc>,
    pub device_untrusted: bool,
    pub recording_duration_s: f64,
    pub parameters: QaParameters,
    pub raw: QaTable,
    pub cleaned: QaTable,
    pub check: QaCheckReport,
    pub summary: TableSummary,
}

/// Read a recording from its JSON hand-off form
pub fn load_recording(path: &Path) -> Result<Recording> {
    let content = fs::read_to_string(path)?;
    let input: RecordingInput = serde_json::from_str(&content)?;
    Recording::try_from(input)
}

/// Output path for a recording: `<output_dir>/<stem>.qa.json`
pub fn report_path(input: &Path, output_dir: &Path) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::InvalidInput(format!("no file stem in {}", input.display())))?;
    Ok(output_dir.join(format!("{}.qa.json", stem)))
}

/// Analyze one recording file and write its report
///
/// Returns the written report path.
pub fn process_recording_file(
    pipeline: &QaPipeline,
    input: &Path,
    output_dir: &Path,
) -> Result<PathBuf> {
    debug!(input = %input.display(), "Loading recording");
    let recording = load_recording(input)?;
    let run = pipeline.analyze(&recording)?;

    let duration = recording.duration_s();
    let report = QaReport {
        source: input.to_path_buf(),
        generated_at: bqa_common::time::now(),
        device_untrusted: recording.device_untrusted(),
        recording_duration_s: duration,
        parameters: pipeline.parameters().clone(),
        summary: summarize_table(&run.cleaned, duration, &default_volume_ranges()),
        raw: run.raw,
        cleaned: run.cleaned,
        check: run.report,
    };

    let path = report_path(input, output_dir)?;
    fs::write(&path, serde_json::to_string_pretty(&report)?)?;
    info!(
        input = %input.display(),
        output = %path.display(),
        breaths = report.raw.len(),
        kept = report.cleaned.len(),
        "Report written"
    );
    Ok(path)
}

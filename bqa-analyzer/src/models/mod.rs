//! Data models for bqa-analyzer
//!
//! - Recording: validated input sample sequence
//! - Breath: candidates, phase markers, refined boundaries, QA table rows
//! - Parameters: per-run detection and validation thresholds

pub mod breath;
pub mod parameters;
pub mod recording;

pub use breath::{
    BreathCandidate, BreathRecord, PhaseMarkers, QaTable, RefinedBreath, SotairAnalysis,
};
pub use parameters::{
    DetectionParameters, DetectionWindows, FlowBand, PhaseParameters, PhaseWindows,
    QaParameters, RefinementParameters, RelativeThresholds, ResolvedThresholds,
    SotairParameters, ThresholdMode, ValidationParameters,
};
pub use recording::{Recording, RecordingBuilder, RecordingInput, Sample};

//! Breath segmentation and QA services
//!
//! Per-recording flow: breath_detector → phase_detector → boundary_refiner →
//! numeric metrics, orchestrated by qa_pipeline.

pub mod boundary_refiner;
pub mod breath_detector;
pub mod numeric;
pub mod phase_detector;
pub mod qa_pipeline;
pub mod table_summary;

pub use boundary_refiner::{
    nearest_zero_crossing, nearest_zero_crossing_within, refine_breath_detection,
    refine_single_breath,
};
pub use breath_detector::{detect_breaths, BreathDetector};
pub use phase_detector::{detect_breath_phases, detect_single_breath_phases};
pub use qa_pipeline::{BoundaryOverride, QaPipeline, QaRun};
pub use table_summary::{default_volume_ranges, summarize_table, TableSummary, VolumeRange};

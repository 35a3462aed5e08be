//! QA validation layer
//!
//! # Validators
//! 1. **plausibility** - Physiological bound checks on QA table rows
//!
//! Validators filter rows; they never edit or renumber the rows they keep.

pub mod plausibility;

pub use plausibility::{
    check_qa_table, DropReason, DroppedBreath, Metric, PlausibilityValidator, QaCheckOutcome,
    QaCheckReport,
};

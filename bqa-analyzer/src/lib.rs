//! bqa-analyzer library interface
//!
//! Breath segmentation and per-breath QA metrics for respiratory flow and
//! pressure recordings.

pub mod batch;
pub mod config;
pub mod models;
pub mod services;
pub mod validators;

pub use crate::config::AnalyzerConfig;
pub use crate::models::{QaParameters, QaTable, Recording};
pub use crate::services::{BoundaryOverride, QaPipeline, QaRun};
pub use crate::validators::{check_qa_table, QaCheckOutcome, QaCheckReport};

//! Test Helper Utilities
//!
//! Shared utilities for testing bqa-analyzer

#![allow(dead_code)]

pub mod log_capture;
pub mod waveform_generator;

pub use log_capture::LogCapture;
pub use waveform_generator::{BreathShape, Waveform};

//! # Breath QA Common Library
//!
//! Shared code for the breath QA workspace:
//! - Error taxonomy (`Error`, `Result`)
//! - TOML configuration loading and config-file resolution
//! - Logging bootstrap
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod logging;
pub mod time;

pub use error::{Error, Result};

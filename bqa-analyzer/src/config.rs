//! Analyzer configuration file
//!
//! ```toml
//! output_dir = "qa-output"
//!
//! [logging]
//! level = "debug"
//!
//! [parameters.detection]
//! threshold_mode = "relative_to_peak"
//!
//! [parameters.validation]
//! max_peak_pressure = 60.0
//! ```

use std::path::{Path, PathBuf};

use bqa_common::config::{load_or_default, LoggingConfig, CONFIG_ENV_VAR};
use bqa_common::Result;
use serde::Deserialize;

use crate::models::QaParameters;

/// Top-level analyzer configuration
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Directory for `<stem>.qa.json` outputs
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    #[serde(default)]
    pub parameters: QaParameters,
}

impl AnalyzerConfig {
    /// Resolve and load the configuration, then validate parameters
    pub fn load(cli_arg: Option<&Path>) -> Result<Self> {
        let config: Self = load_or_default(cli_arg, CONFIG_ENV_VAR)?;
        config.parameters.validate()?;
        Ok(config)
    }
}

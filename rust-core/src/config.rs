//! Analysis configuration.
//!
//! Bundles the decoder and solver settings into one package that can be
//! loaded from a JSON file. Missing fields fall back to their defaults, so a
//! file only needs to name what it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::decoder::DecoderConfig;
use crate::error::{ConfigError, Result};
use crate::spectral::SolverConfig;

/// Configuration for a complete decode-and-tune run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Resync search and log format settings.
    pub decoder: DecoderConfig,

    /// PCA / LDA settings.
    pub solver: SolverConfig,

    /// Samples to drop with the distance-from-mean scorer before solving.
    pub outliers_to_remove: usize,
}

impl AnalysisConfig {
    /// Load from a JSON file and validate.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Parse from JSON text and validate.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: AnalysisConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values no run could use.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let d = &self.decoder;
        if d.max_skip == 0 {
            return Err(ConfigError::Invalid("decoder.max_skip must be positive".into()));
        }
        if d.battery_format_cutover <= 0 {
            return Err(ConfigError::Invalid(format!(
                "decoder.battery_format_cutover must be a positive timestamp, got {}",
                d.battery_format_cutover
            )));
        }

        let s = &self.solver;
        if !(s.singularity_tolerance.is_finite() && s.singularity_tolerance >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "solver.singularity_tolerance must be finite and non-negative, got {}",
                s.singularity_tolerance
            )));
        }
        if s.pre_reduction_axes == Some(0) {
            return Err(ConfigError::Invalid(
                "solver.pre_reduction_axes must be at least 1 when set".into(),
            ));
        }
        Ok(())
    }
}

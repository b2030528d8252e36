//! Wake Gesture Tuning Toolkit
//!
//! Decodes the binary accelerometer logs written by a wrist-worn device each
//! time it woke up, and provides the tools used to tune the on-device wake
//! gesture filters against those logs.
//!
//! # Data flow
//!
//! - **Decode**: [`decoder::StreamDecoder`] resynchronizes on start markers and
//!   yields wake bursts and battery records, recording every anomaly as a
//!   typed diagnostic instead of giving up on the whole log.
//! - **Select**: [`sample_set::SampleSet`] filters samples with combinable
//!   predicates and materializes 96-wide feature matrices.
//! - **Classify**: [`classifier::Classifier`] stages chained in a
//!   [`cascade::CascadePipeline`] produce per-stage and aggregate confusion
//!   matrices.
//! - **Solve**: [`spectral::SpectralWeightSolver`] derives PCA / LDA axes that
//!   become new fixed-weight classifiers.
//!
//! # Example
//!
//! ```ignore
//! use wake_tuner::{firmware, DecoderConfig, SampleSet};
//!
//! let (set, summary) = SampleSet::from_file("wake.bin", &DecoderConfig::default(), 0)?;
//! let mut cascade = firmware::firmware_cascade()?.with_input(set);
//! println!("{}", cascade.run()?);
//! ```

pub mod cascade;
pub mod classifier;
pub mod config;
pub mod confusion;
pub mod decoder;
pub mod error;
pub mod firmware;
pub mod sample_set;
pub mod spectral;
pub mod types;
pub mod wire;

#[cfg(test)]
mod stress_tests;

// Re-export commonly used types
pub use cascade::{CascadePipeline, CascadeReport, Stage, StageReport};
pub use classifier::{Classifier, FeatureValue, Verdict};
pub use config::AnalysisConfig;
pub use confusion::{ConfusionMatrix, Tally};
pub use decoder::{decode_source, DecodeSummary, DecodedSource, DecoderConfig, Diagnostic, StreamDecoder};
pub use error::{ConfigError, DecodeError, Error, FramingError, Result, TruncationError};
pub use sample_set::{Filter, Predicate, SampleSet, SampleSetSummary};
pub use spectral::{AcceptSide, SolverConfig, SpectralAxes, SpectralWeightSolver};
pub use types::{Axis, BatterySample, Record, Triplet, WakeSample};

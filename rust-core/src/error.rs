//! Error types for decoding, classification and spectral solving.
//!
//! Decode-time errors are scoped narrowly: a [`FramingError`] on one burst is
//! recorded and decoding resumes, while a [`DecodeError`] ends one source
//! only. [`ConfigError`] surfaces immediately to the caller.

use thiserror::Error;

/// Errors produced by the pure frame (de)serialization functions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Not enough bytes left for the record shape being decoded.
    #[error("insufficient data: need {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },

    /// The first header byte is neither the confirmed nor the unconfirmed flag.
    #[error("invalid confirmed flag byte {0:#04x} (expected 0xcc or 0xee)")]
    InvalidConfirmedByte(u8),
}

/// Loss of alignment with the framing protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    /// The resync search consumed more non-marker bytes than allowed.
    #[error("resync budget exceeded at offset {offset}: skipped {skipped} bytes (budget {budget})")]
    SkipBudgetExceeded {
        offset: usize,
        skipped: usize,
        budget: usize,
    },

    /// More triplets than a FIFO can hold were read before the end marker.
    #[error("burst at offset {offset} exceeds {max} triplets before end marker")]
    TooManyTriplets { offset: usize, max: usize },

    /// The FIFO header after a start marker could not be decoded.
    #[error("invalid burst header at offset {offset}: {source}")]
    InvalidHeader {
        offset: usize,
        #[source]
        source: CodecError,
    },
}

/// End of input in the middle of a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("input ended mid-record at offset {offset}: need {needed} bytes, {available} available")]
pub struct TruncationError {
    pub offset: usize,
    pub needed: usize,
    pub available: usize,
}

/// Reason a single source stopped decoding before its natural end.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("truncated: {0}")]
    Truncated(#[from] TruncationError),
}

/// Invalid classifier or solver setup.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A threshold vector does not match the feature dimension.
    #[error("classifier '{classifier}': {field} has {got} dimensions, feature has {expected}")]
    ThresholdLength {
        classifier: String,
        field: &'static str,
        expected: usize,
        got: usize,
    },

    /// The feature function produced a value of unexpected shape.
    #[error("classifier '{classifier}': feature produced {got} dimensions, expected {expected}")]
    FeatureLength {
        classifier: String,
        expected: usize,
        got: usize,
    },

    /// A weight vector does not match the feature vector length.
    #[error("weight vector has {got} entries, expected {expected}")]
    WeightLength { expected: usize, got: usize },

    /// A solver class contains no samples.
    #[error("class {class} has no samples")]
    EmptyClass { class: usize },

    /// Solver received no samples at all.
    #[error("no samples supplied to solver")]
    EmptyInput,

    /// LDA needs at least two classes.
    #[error("discriminant analysis needs at least 2 classes, got {got}")]
    TooFewClasses { got: usize },

    /// Matrices supplied together disagree in column count.
    #[error("dimension mismatch: expected {expected} columns, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Within-class scatter cannot be inverted.
    #[error("within-class scatter is singular (min eigenvalue {min_eigenvalue:e}, max {max_eigenvalue:e})")]
    SingularScatter {
        min_eigenvalue: f64,
        max_eigenvalue: f64,
    },

    /// Requested eigen-axis does not exist.
    #[error("axis {axis} out of range ({available} axes)")]
    AxisOutOfRange { axis: usize, available: usize },

    /// A configuration value is out of its valid range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Common result type.
pub type Result<T> = std::result::Result<T, Error>;

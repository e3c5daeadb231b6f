use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::DataKind;

/// Invalid configuration, detected once while the pipeline is built.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("{field} must be finite, got {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("{field}: min {min} exceeds max {max}")]
    InvertedRange { field: String, min: f64, max: f64 },

    #[error("{field} must lie in [0, 1], got {value}")]
    FractionOutOfRange { field: &'static str, value: f64 },

    #[error("left_frac {left} must be less than right_frac {right}")]
    ThresholdOrder { left: f64, right: f64 },

    #[error("invalid structuring element: {0}")]
    Kernel(String),

    #[error("{op} iterations round to {rounded}, which is negative")]
    NegativeIterations { op: &'static str, rounded: i64 },

    #[error("stage {stage} expects {expected:?} but the previous stage yields {actual:?}")]
    StageMismatch {
        stage: String,
        expected: DataKind,
        actual: DataKind,
    },

    #[error("pipeline must end with a candidate, last stage yields {0:?}")]
    MissingSelector(DataKind),

    #[error("debug directory is not empty: {0}")]
    DebugDirNotEmpty(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// A stage could not process the current frame. Only that frame is lost.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("frame buffer holds {actual} bytes, expected {expected} for {width}x{height}x{channels}")]
    MalformedBuffer {
        width: u32,
        height: u32,
        channels: u8,
        expected: usize,
        actual: usize,
    },

    #[error("unsupported channel count: {0}")]
    UnsupportedChannels(u8),

    #[error("frame has no pixels ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },

    #[error("stage {stage} received {actual:?}, expected {expected:?}")]
    UnexpectedInput {
        stage: String,
        expected: DataKind,
        actual: DataKind,
    },

    #[error("failed to write debug output {path}: {message}")]
    DebugOutput { path: PathBuf, message: String },
}

/// Frame acquisition failed; the control loop stops.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

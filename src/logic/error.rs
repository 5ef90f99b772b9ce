//! Error taxonomy for the detection engine
//!
//! Each stage owns its error type so callers can tell a fatal startup
//! failure from a per-iteration or per-model one.

use std::any::Any;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal at startup. The engine never runs on a partially loaded store.
#[derive(Debug, Error)]
pub enum ArtifactLoadError {
    #[error("artifact not found: {0}")]
    Missing(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid artifact: {0}")]
    Invalid(String),

    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("no classifier models registered")]
    NoModels,

    #[error("{what}: expected {expected} columns, got {got}")]
    DimensionMismatch {
        what: String,
        expected: usize,
        got: usize,
    },

    #[error("failed to load model '{name}': {reason}")]
    Model { name: String, reason: String },
}

/// Per-iteration failure while building the model input.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransformError {
    #[error("normalizer expects {expected} columns, got {got}")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("combined importance score is not finite ({0})")]
    NonFiniteScore(f64),
}

/// Per-model failure. Isolated to that model's entry in the result.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelPredictionError {
    #[error("model expects {expected} inputs, got {got}")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("inference failed: {0}")]
    Runtime(String),

    #[error("probability out of range: {0}")]
    OutOfRange(f64),
}

/// Anything that ends a detection run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LoopFatalError {
    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("packet source closed")]
    SourceClosed,

    #[error("detection loop panicked: {0}")]
    Panicked(String),
}

/// Failure while scoring a batch of flows.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to read flows: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("flow {index}: {source}")]
    Transform {
        index: usize,
        #[source]
        source: TransformError,
    },
}

/// Readable text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

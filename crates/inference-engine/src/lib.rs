//! Driver State Classification
//!
//! Wraps an opaque object detector and normalizes its per-frame output into
//! one of three driver states. The detector is a capability trait so the
//! ONNX model, a scripted stub, or nothing at all can sit behind it.

mod adapter;
mod detection;
mod onnx;
mod scripted;

pub use adapter::{Classification, ClassificationAdapter, Classifier, NullClassifier};
pub use detection::{BoundingBox, Detection, DetectionState};
pub use onnx::{OnnxClassifier, OnnxConfig};
pub use scripted::{ScriptHandle, ScriptedClassifier};

use thiserror::Error;

/// Default detector confidence threshold
pub const DEFAULT_CONFIDENCE: f32 = 0.4;

/// Detector thresholds must lie strictly between 0 and 1
pub fn is_valid_confidence(threshold: f32) -> bool {
    threshold.is_finite() && threshold > 0.0 && threshold < 1.0
}

/// Errors during classification
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Model load failed: {0}")]
    ModelLoadError(String),
    #[error("Model unavailable")]
    Unavailable,
    #[error("Inference failed: {0}")]
    InferenceFailed(String),
    #[error("Invalid output shape: expected {expected}, got {actual}")]
    InvalidOutputShape { expected: String, actual: String },
}

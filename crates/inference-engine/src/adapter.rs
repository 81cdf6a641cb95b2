//! Classification adapter

use camera_capture::VideoFrame;
use tracing::{debug, warn};

use crate::detection::{Detection, DetectionState};
use crate::{is_valid_confidence, InferenceError, DEFAULT_CONFIDENCE};

/// Opaque object detector: frame in, labelled boxes out
pub trait Classifier: Send {
    /// Whether a model is loaded and able to run
    fn is_available(&self) -> bool {
        true
    }

    /// Run the detector on one frame
    fn detect(
        &mut self,
        frame: &VideoFrame,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>, InferenceError>;
}

/// Detector stand-in used when no model is configured
#[derive(Debug, Default)]
pub struct NullClassifier;

impl Classifier for NullClassifier {
    fn is_available(&self) -> bool {
        false
    }

    fn detect(&mut self, _frame: &VideoFrame, _threshold: f32) -> Result<Vec<Detection>, InferenceError> {
        Err(InferenceError::Unavailable)
    }
}

/// Normalized per-frame result
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub state: DetectionState,
    /// Detection that decided the state
    pub best: Option<Detection>,
    /// Everything the detector returned
    pub detections: Vec<Detection>,
}

impl Classification {
    fn attentive() -> Self {
        Self::default()
    }
}

/// Reduces raw detector output to a single [`DetectionState`].
///
/// Priority is Yawn > Drowsy > Attentive. A missing or failing model yields
/// `Attentive` with no detections so the tick loop never stalls on it.
pub struct ClassificationAdapter {
    classifier: Box<dyn Classifier>,
    failures: u64,
}

impl ClassificationAdapter {
    pub fn new(classifier: Box<dyn Classifier>) -> Self {
        if !classifier.is_available() {
            warn!("No detection model available; every frame will read as attentive");
        }
        Self {
            classifier,
            failures: 0,
        }
    }

    /// Classify one frame
    pub fn classify(&mut self, frame: &VideoFrame, confidence_threshold: f32) -> Classification {
        let threshold = sanitize_threshold(confidence_threshold);

        if !self.classifier.is_available() {
            return Classification::attentive();
        }

        let detections = match self.classifier.detect(frame, threshold) {
            Ok(d) => d,
            Err(e) => {
                self.failures += 1;
                debug!("Detector failed (total {}): {}", self.failures, e);
                return Classification::attentive();
            }
        };

        let classification = reduce(detections);
        metrics::counter!("dms_frames_classified_total", "state" => classification.state.as_str())
            .increment(1);
        classification
    }

    /// Number of detector calls that failed
    pub fn failure_count(&self) -> u64 {
        self.failures
    }

    pub fn is_model_available(&self) -> bool {
        self.classifier.is_available()
    }
}

/// Pick the winning label; the first box of that label is kept
fn reduce(detections: Vec<Detection>) -> Classification {
    let first_of = |state: DetectionState| {
        detections
            .iter()
            .find(|d| d.state() == Some(state))
            .cloned()
    };

    let (state, best) = if let Some(d) = first_of(DetectionState::Yawn) {
        (DetectionState::Yawn, Some(d))
    } else if let Some(d) = first_of(DetectionState::Drowsy) {
        (DetectionState::Drowsy, Some(d))
    } else {
        (DetectionState::Attentive, first_of(DetectionState::Attentive))
    };

    Classification {
        state,
        best,
        detections,
    }
}

/// Thresholds outside (0, 1) fall back to the default
fn sanitize_threshold(threshold: f32) -> f32 {
    if is_valid_confidence(threshold) {
        threshold
    } else {
        DEFAULT_CONFIDENCE
    }
}

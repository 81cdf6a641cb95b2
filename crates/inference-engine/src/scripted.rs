//! Scripted classifier for demos and tests

use std::sync::{Arc, Mutex};

use camera_capture::VideoFrame;

use crate::adapter::Classifier;
use crate::detection::{BoundingBox, Detection, DetectionState};
use crate::InferenceError;

#[derive(Debug, Clone)]
enum Script {
    Detections(Vec<Detection>),
    Fail,
}

/// Classifier whose output is set from outside through a [`ScriptHandle`]
pub struct ScriptedClassifier {
    script: Arc<Mutex<Script>>,
}

/// Controls what a [`ScriptedClassifier`] reports
#[derive(Clone)]
pub struct ScriptHandle {
    script: Arc<Mutex<Script>>,
}

impl ScriptedClassifier {
    /// New classifier reporting `attentive`, plus its control handle
    pub fn new() -> (Self, ScriptHandle) {
        let script = Arc::new(Mutex::new(Script::Detections(Vec::new())));
        (
            Self {
                script: Arc::clone(&script),
            },
            ScriptHandle { script },
        )
    }
}

impl ScriptHandle {
    /// Report a single full-frame detection of `state`
    pub fn set_state(&self, state: DetectionState) {
        let bbox = BoundingBox { x1: 0.0, y1: 0.0, x2: 1.0, y2: 1.0 };
        self.set_detections(vec![Detection::new(state.as_str(), 0.9, bbox)]);
    }

    pub fn set_detections(&self, detections: Vec<Detection>) {
        if let Ok(mut script) = self.script.lock() {
            *script = Script::Detections(detections);
        }
    }

    /// Make every following call fail
    pub fn fail(&self) {
        if let Ok(mut script) = self.script.lock() {
            *script = Script::Fail;
        }
    }
}

impl Classifier for ScriptedClassifier {
    fn detect(&mut self, _frame: &VideoFrame, threshold: f32) -> Result<Vec<Detection>, InferenceError> {
        let script = self
            .script
            .lock()
            .map_err(|e| InferenceError::InferenceFailed(format!("Lock error: {}", e)))?;

        match &*script {
            Script::Detections(d) => Ok(d
                .iter()
                .filter(|det| det.confidence >= threshold)
                .cloned()
                .collect()),
            Script::Fail => Err(InferenceError::InferenceFailed("scripted failure".into())),
        }
    }
}

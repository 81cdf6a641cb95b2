//! ONNX detector backed by tract

use camera_capture::VideoFrame;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};
use tract_onnx::prelude::*;

use crate::adapter::Classifier;
use crate::detection::{BoundingBox, Detection};
use crate::InferenceError;

/// ONNX detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OnnxConfig {
    /// Path to the exported detector (`None` = no model)
    pub model_path: Option<String>,
    /// Square input edge the model was exported with
    pub input_size: u32,
    /// Class names in model output order
    pub class_names: Vec<String>,
}

impl Default for OnnxConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            input_size: 640,
            class_names: vec![
                "attentive".to_string(),
                "drowsy".to_string(),
                "yawn".to_string(),
            ],
        }
    }
}

type Plan = TypedRunnableModel<TypedModel>;

/// YOLO-style detector (`[1, 4 + classes, anchors]` output)
pub struct OnnxClassifier {
    plan: Option<Plan>,
    input_size: u32,
    class_names: Vec<String>,
}

impl OnnxClassifier {
    /// Load the configured model.
    ///
    /// A missing path gives an unavailable classifier; a path that fails to
    /// load is an error so misconfiguration is visible at startup.
    pub fn new(config: &OnnxConfig) -> Result<Self, InferenceError> {
        let plan = match &config.model_path {
            Some(path) => Some(load_plan(Path::new(path), config.input_size)?),
            None => {
                warn!("No detection model path configured");
                None
            }
        };

        Ok(Self {
            plan,
            input_size: config.input_size.max(1),
            class_names: config.class_names.clone(),
        })
    }

    fn preprocess(&self, frame: &VideoFrame) -> Result<Tensor, InferenceError> {
        let img = frame.to_rgb_image().ok_or_else(|| {
            InferenceError::InferenceFailed("frame buffer does not match its size".into())
        })?;
        let size = self.input_size;
        let resized = image::imageops::resize(&img, size, size, image::imageops::FilterType::Triangle);

        let input: Tensor = tract_ndarray::Array4::from_shape_fn(
            (1, 3, size as usize, size as usize),
            |(_, c, y, x)| resized[(x as u32, y as u32)][c] as f32 / 255.0,
        )
        .into();
        Ok(input)
    }

    fn decode(
        &self,
        output: &Tensor,
        frame: &VideoFrame,
        threshold: f32,
    ) -> Result<Vec<Detection>, InferenceError> {
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;
        let shape = view.shape().to_vec();
        let channels = 4 + self.class_names.len();

        if shape.len() != 3 || shape[0] != 1 {
            return Err(InferenceError::InvalidOutputShape {
                expected: format!("[1, {}, N]", channels),
                actual: format!("{:?}", shape),
            });
        }

        // Exporters disagree on whether anchors come last or first
        let anchors_last = shape[1] == channels;
        if !anchors_last && shape[2] != channels {
            return Err(InferenceError::InvalidOutputShape {
                expected: format!("[1, {}, N]", channels),
                actual: format!("{:?}", shape),
            });
        }
        let anchors = if anchors_last { shape[2] } else { shape[1] };
        let at = |channel: usize, anchor: usize| {
            if anchors_last {
                view[[0, channel, anchor]]
            } else {
                view[[0, anchor, channel]]
            }
        };

        let sx = frame.width as f32 / self.input_size as f32;
        let sy = frame.height as f32 / self.input_size as f32;

        let mut detections = Vec::new();
        for anchor in 0..anchors {
            let (class_idx, score) = (0..self.class_names.len())
                .map(|c| (c, at(4 + c, anchor)))
                .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

            if score < threshold {
                continue;
            }

            let bbox = BoundingBox::from_center(
                at(0, anchor) * sx,
                at(1, anchor) * sy,
                at(2, anchor) * sx,
                at(3, anchor) * sy,
                frame.width as f32,
                frame.height as f32,
            );
            detections.push(Detection::new(self.class_names[class_idx].clone(), score, bbox));
        }

        // Strongest first so "first of label" means "best of label"
        detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        Ok(detections)
    }
}

fn load_plan(path: &Path, input_size: u32) -> Result<Plan, InferenceError> {
    info!("Loading detection model from {}", path.display());
    let size = input_size.max(1) as usize;

    tract_onnx::onnx()
        .model_for_path(path)
        .and_then(|model| model.with_input_fact(0, f32::fact([1, 3, size, size]).into()))
        .and_then(|model| model.into_optimized())
        .and_then(|model| model.into_runnable())
        .map_err(|e| InferenceError::ModelLoadError(format!("{}: {}", path.display(), e)))
}

impl Classifier for OnnxClassifier {
    fn is_available(&self) -> bool {
        self.plan.is_some()
    }

    fn detect(&mut self, frame: &VideoFrame, threshold: f32) -> Result<Vec<Detection>, InferenceError> {
        let plan = self.plan.as_ref().ok_or(InferenceError::Unavailable)?;

        let input = self.preprocess(frame)?;
        let outputs = plan
            .run(tvec!(input.into()))
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;

        let output = outputs
            .first()
            .ok_or_else(|| InferenceError::InferenceFailed("model produced no outputs".into()))?;
        let detections = self.decode(output, frame, threshold)?;

        debug!("Detector returned {} boxes", detections.len());
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier(input_size: u32) -> OnnxClassifier {
        OnnxClassifier {
            plan: None,
            input_size,
            class_names: OnnxConfig::default().class_names,
        }
    }

    #[test]
    fn test_no_model_path_is_unavailable() {
        let c = OnnxClassifier::new(&OnnxConfig::default()).unwrap();
        assert!(!c.is_available());
    }

    #[test]
    fn test_bad_model_path_is_error() {
        let config = OnnxConfig {
            model_path: Some("/nonexistent/final_model.onnx".into()),
            ..Default::default()
        };
        assert!(matches!(
            OnnxClassifier::new(&config),
            Err(InferenceError::ModelLoadError(_))
        ));
    }

    #[test]
    fn test_decode_channels_first() {
        let c = classifier(10);
        let frame = VideoFrame::filled(20, 20, [0, 0, 0]);

        // 7 channels (box + 3 classes) x 2 anchors
        let data: Vec<f32> = vec![
            5.0, 5.0, // cx
            5.0, 5.0, // cy
            2.0, 2.0, // w
            2.0, 2.0, // h
            0.1, 0.2, // attentive
            0.7, 0.1, // drowsy
            0.2, 0.3, // yawn
        ];
        let tensor = tract_ndarray::Array3::from_shape_vec((1, 7, 2), data)
            .unwrap()
            .into_tensor();

        let dets = c.decode(&tensor, &frame, 0.25).unwrap();
        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].label, "drowsy");
        assert_eq!(dets[1].label, "yawn");
        // Scaled back to the 20x20 frame
        assert!((dets[0].bbox.x1 - 8.0).abs() < 1e-4);
        assert!((dets[0].bbox.x2 - 12.0).abs() < 1e-4);
    }

    #[test]
    fn test_decode_rejects_unknown_shape() {
        let c = classifier(10);
        let frame = VideoFrame::filled(10, 10, [0, 0, 0]);
        let tensor = tract_ndarray::Array3::<f32>::zeros((1, 5, 5)).into_tensor();
        assert!(matches!(
            c.decode(&tensor, &frame, 0.5),
            Err(InferenceError::InvalidOutputShape { .. })
        ));
    }
}

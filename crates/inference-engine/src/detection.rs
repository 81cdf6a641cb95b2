//! Detector output types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Driver state derived from one processed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionState {
    #[default]
    Attentive,
    Yawn,
    Drowsy,
}

impl DetectionState {
    /// Label string as written to the event log
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionState::Attentive => "attentive",
            DetectionState::Yawn => "yawn",
            DetectionState::Drowsy => "drowsy",
        }
    }

    /// Map a detector class label onto a state
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "attentive" => Some(DetectionState::Attentive),
            "yawn" => Some(DetectionState::Yawn),
            "drowsy" => Some(DetectionState::Drowsy),
            _ => None,
        }
    }

    pub fn is_drowsy(&self) -> bool {
        matches!(self, DetectionState::Drowsy)
    }
}

impl fmt::Display for DetectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Axis-aligned box in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    /// Build from a centre/size box, clamped to the frame
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32, frame_w: f32, frame_h: f32) -> Self {
        Self {
            x1: (cx - w / 2.0).clamp(0.0, frame_w),
            y1: (cy - h / 2.0).clamp(0.0, frame_h),
            x2: (cx + w / 2.0).clamp(0.0, frame_w),
            y2: (cy + h / 2.0).clamp(0.0, frame_h),
        }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }
}

/// One raw detector hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Class label as named by the model
    pub label: String,
    /// Confidence score (0.0 to 1.0)
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }

    /// State this detection maps to, if its label is known
    pub fn state(&self) -> Option<DetectionState> {
        DetectionState::from_label(&self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_mapping() {
        assert_eq!(DetectionState::from_label("yawn"), Some(DetectionState::Yawn));
        assert_eq!(DetectionState::from_label(" Drowsy "), Some(DetectionState::Drowsy));
        assert_eq!(DetectionState::from_label("phone"), None);
    }

    #[test]
    fn test_box_from_center_clamps() {
        let b = BoundingBox::from_center(5.0, 5.0, 20.0, 4.0, 100.0, 100.0);
        assert_eq!(b.x1, 0.0);
        assert_eq!(b.x2, 15.0);
        assert_eq!(b.height(), 4.0);
    }
}

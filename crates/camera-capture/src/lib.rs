//! Camera Capture Library for Driver Drowsiness Monitoring
//!
//! Provides the frame types consumed by the classifier and the sources
//! that feed them:
//! - RGB video frames with grayscale/equalization preprocessing
//! - Image-directory replay (webcam stand-in)
//! - Static single-frame source for tests and demos

pub mod frame;
pub mod source;

pub use frame::VideoFrame;
pub use source::{FrameSource, ImageDirSource, StaticSource};

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    Open(String),

    #[error("Invalid format: {0}")]
    Format(String),
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Device path or frame directory
    pub device: String,
    /// Capture width
    pub width: u32,
    /// Capture height
    pub height: u32,
    /// Interval between processed frames
    pub tick_ms: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "frames".to_string(),
            width: 640,
            height: 480,
            tick_ms: 30, // ~33 fps video tick
        }
    }
}

impl CameraConfig {
    /// Interval between processed frames (never zero)
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

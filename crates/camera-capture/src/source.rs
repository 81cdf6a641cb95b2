//! Frame sources

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::{CameraConfig, CameraError, VideoFrame};

/// Anything that can hand the detection loop its next frame.
///
/// `Ok(None)` means no frame is available this tick; the loop skips the tick
/// and tries again.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError>;
}

/// Replays image files from a directory in file-name order, looping forever.
///
/// Stands in for the cabin webcam on machines without a capture device.
pub struct ImageDirSource {
    files: Vec<PathBuf>,
    cursor: usize,
    width: u32,
    height: u32,
    sequence: u32,
    started: Instant,
}

impl ImageDirSource {
    /// Open a directory of `.png`/`.jpg`/`.jpeg`/`.bmp` frames
    pub fn open(config: &CameraConfig) -> Result<Self, CameraError> {
        let dir = Path::new(&config.device);
        let entries = std::fs::read_dir(dir)
            .map_err(|e| CameraError::Open(format!("{}: {}", dir.display(), e)))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_image_file(path))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(CameraError::Open(format!(
                "no image frames found in {}",
                dir.display()
            )));
        }

        info!("Opened frame directory {} ({} frames)", dir.display(), files.len());

        Ok(Self {
            files,
            cursor: 0,
            width: config.width,
            height: config.height,
            sequence: 0,
            started: Instant::now(),
        })
    }

    /// Number of frames in the replay loop
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if the replay loop is empty
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for ImageDirSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        let path = &self.files[self.cursor];
        self.cursor = (self.cursor + 1) % self.files.len();

        let img = match image::open(path) {
            Ok(img) => img.to_rgb8(),
            Err(e) => {
                // A corrupt frame is a dropped frame, not a dead camera
                warn!("Skipping unreadable frame {}: {}", path.display(), e);
                return Ok(None);
            }
        };

        self.sequence = self.sequence.wrapping_add(1);
        let timestamp_ns = self.started.elapsed().as_nanos() as u64;
        let frame = VideoFrame::from_rgb_image(img, timestamp_ns, self.sequence)
            .resize(self.width, self.height);

        debug!("Frame {} from {}", self.sequence, path.display());
        Ok(Some(frame))
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg" | "bmp"))
        .unwrap_or(false)
}

/// Yields the same frame on every tick
pub struct StaticSource {
    frame: VideoFrame,
}

impl StaticSource {
    pub fn new(frame: VideoFrame) -> Self {
        Self { frame }
    }
}

impl FrameSource for StaticSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        let mut frame = self.frame.clone();
        self.frame.sequence = self.frame.sequence.wrapping_add(1);
        frame.sequence = self.frame.sequence;
        Ok(Some(frame))
    }
}

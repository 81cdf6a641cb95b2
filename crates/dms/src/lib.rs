//! Driver Monitoring System (DMS)
//!
//! Drowsiness and yawn event tracking on top of per-frame classification:
//! - Yawn counting with delayed, cooled-down warnings
//! - Drowsy streak timing, alert latching and streak history
//! - Rolling alertness score and end-of-trip fatigue metrics
//! - Break reminders from continuous driving time
//! - Session lifecycle and the background tasks that drive it

pub mod alertness;
pub mod analysis;
pub mod break_timer;
pub mod config;
pub mod drowsy;
pub mod metrics;
pub mod runner;
pub mod session;
pub mod yawn;

pub use alertness::{AlertnessTally, AlertnessWindow};
pub use analysis::{Directive, LiveSnapshot, LogEntry, SoundCue, TickOutcome};
pub use break_timer::{BreakAction, BreakPrompt, BreakStatus, BreakTimer};
pub use config::DmsConfig;
pub use drowsy::{DrowsyTracker, DrowsyUpdate};
pub use metrics::SessionMetrics;
pub use runner::{AudioSink, NullAudio, SessionRunner, SharedSession};
pub use session::{DetectionSession, FrameClassifier, SessionPaths, SessionSummary};
pub use yawn::{YawnTracker, YawnUpdate};

use thiserror::Error;

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session already stopped")]
    SessionStopped,

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Camera error: {0}")]
    Camera(#[from] camera_capture::CameraError),
}

//! Per-tick outputs surfaced to the UI layer

use alerting::EmergencyRequest;
use inference_engine::{Detection, DetectionState};
use serde::Serialize;
use std::time::Duration;
use storage::EventKind;

/// A row the session writes to the trip log
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub kind: EventKind,
    pub details: String,
}

impl LogEntry {
    pub fn new(kind: EventKind, details: impl Into<String>) -> Self {
        Self {
            kind,
            details: details.into(),
        }
    }
}

/// Sounds the UI can play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundCue {
    YawnWarning,
    DrowsyAlarm,
}

/// What the UI should do after a tick
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Directive {
    PlaySound { cue: SoundCue, looped: bool },
    StopSound { cue: SoundCue },
    ShowWarning {
        title: String,
        message: String,
        #[serde(with = "secs")]
        duration: Duration,
    },
}

impl Directive {
    pub fn yawn_warning() -> Self {
        Directive::ShowWarning {
            title: "WARNING: HIGH YAWN RATE".into(),
            message: "Multiple yawns detected. Consider a short rest.".into(),
            duration: Duration::from_secs(6),
        }
    }

    pub fn drowsy_warning() -> Self {
        Directive::ShowWarning {
            title: "WARNING: DROWSINESS".into(),
            message: "Prolonged eye-closure detected. Pull over and rest.".into(),
            duration: Duration::from_secs(8),
        }
    }
}

mod secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}

/// Result of processing one frame
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    pub state: DetectionState,
    /// Box of the winning label, for drawing
    pub best: Option<Detection>,
    pub directives: Vec<Directive>,
    /// Rows already appended to the trip log on this tick
    pub logs: Vec<LogEntry>,
    /// Approved emergency send the caller must dispatch
    pub emergency: Option<EmergencyRequest>,
    pub yawn_pending: bool,
    /// The session was paused and the frame was not processed
    pub skipped: bool,
}

/// Live view of a running session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveSnapshot {
    pub state: DetectionState,
    pub paused: bool,
    pub yawn_count: u32,
    /// Length of the open drowsy streak, 0 when none
    pub drowsy_timer_s: f64,
    pub alertness_pct: f64,
    pub yawn_warnings: u32,
    pub drowsy_warnings: u32,
    pub drowsy_alert_active: bool,
    pub drowsy_alert_threshold_s: f64,
    pub confidence: f32,
    pub emergency_enabled: bool,
    /// Seconds until automated emergency sends are allowed again
    pub emergency_window_remaining_s: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_json() {
        let json = serde_json::to_value(Directive::drowsy_warning()).unwrap();
        assert_eq!(json["type"], "show_warning");
        assert_eq!(json["title"], "WARNING: DROWSINESS");
        assert_eq!(json["duration"], 8.0);

        let json = serde_json::to_value(Directive::PlaySound {
            cue: SoundCue::DrowsyAlarm,
            looped: true,
        })
        .unwrap();
        assert_eq!(json["cue"], "drowsy_alarm");
    }
}

//! Detection session
//!
//! Owns the trackers for one trip, from `Trip_Start` to `Trip_End`. All
//! time-dependent methods take `now` so a session can be driven by a
//! simulated clock.

use alerting::{EmergencyGate, EmergencyRequest, SendKind};
use camera_capture::VideoFrame;
use chrono::Local;
use inference_engine::{
    is_valid_confidence, Classification, ClassificationAdapter, Classifier, DetectionState, DEFAULT_CONFIDENCE,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use storage::{EventKind, EventLog, ReportInput, TripReport};
use tracing::{debug, info, warn};

use crate::alertness::{AlertnessTally, AlertnessWindow};
use crate::analysis::{Directive, LiveSnapshot, LogEntry, SoundCue, TickOutcome};
use crate::config::{seconds, DmsConfig};
use crate::drowsy::DrowsyTracker;
use crate::metrics::{self, SessionMetrics};
use crate::yawn::YawnTracker;
use crate::DmsError;

/// Where a session writes its files
#[derive(Debug, Clone)]
pub struct SessionPaths {
    pub log_dir: PathBuf,
    pub report_dir: PathBuf,
}

/// Returned by [`DetectionSession::stop`]
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    /// `None` when the report could not be written
    pub report_path: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
    pub metrics: SessionMetrics,
    pub drive_time_s: f64,
}

/// Equalizes and classifies frames outside the session lock.
///
/// Cheap to clone; clones share one detector.
#[derive(Clone)]
pub struct FrameClassifier {
    adapter: Arc<Mutex<ClassificationAdapter>>,
}

impl FrameClassifier {
    fn new(classifier: Box<dyn Classifier>) -> Self {
        Self {
            adapter: Arc::new(Mutex::new(ClassificationAdapter::new(classifier))),
        }
    }

    /// Preprocess and classify one frame. May block on inference.
    pub fn classify(&self, frame: &VideoFrame, confidence: f32) -> Classification {
        let processed = frame.equalized();
        match self.adapter.lock() {
            Ok(mut adapter) => adapter.classify(&processed, confidence),
            Err(e) => {
                warn!("Classifier unavailable: {}", e);
                Classification::default()
            }
        }
    }
}

pub struct DetectionSession {
    classifier: FrameClassifier,
    yawn: YawnTracker,
    drowsy: DrowsyTracker,
    alertness: AlertnessWindow,
    tally: AlertnessTally,
    gate: Arc<EmergencyGate>,

    log: Option<EventLog>,
    report_dir: PathBuf,
    start_stamp: String,
    started_at: Instant,

    confidence: f32,
    state: DetectionState,
    paused: bool,
    stopped: bool,
    state_interval: Duration,
    last_state_sample: Option<Instant>,
}

impl DetectionSession {
    /// Start a trip: create the log and write `Trip_Start`.
    ///
    /// A log that cannot be created is not fatal; the session runs without
    /// one.
    pub fn start(
        config: &DmsConfig,
        classifier: Box<dyn Classifier>,
        gate: Arc<EmergencyGate>,
        paths: &SessionPaths,
        now: Instant,
    ) -> Self {
        let start_stamp = EventLog::session_stamp();
        let log = match EventLog::create(&paths.log_dir, &start_stamp) {
            Ok(log) => {
                log.record(EventKind::TripStart, "Detection started.");
                Some(log)
            }
            Err(e) => {
                warn!("Running without a trip log: {}", e);
                None
            }
        };

        let confidence = if is_valid_confidence(config.confidence) {
            config.confidence
        } else {
            warn!(
                "Configured confidence {} outside (0, 1); using {}",
                config.confidence, DEFAULT_CONFIDENCE
            );
            DEFAULT_CONFIDENCE
        };
        info!("Detection session {} started", start_stamp);

        Self {
            classifier: FrameClassifier::new(classifier),
            yawn: YawnTracker::new(config),
            drowsy: DrowsyTracker::new(config),
            alertness: AlertnessWindow::new(seconds(config.alertness_window_s, 30.0)),
            tally: AlertnessTally::default(),
            gate,
            log,
            report_dir: paths.report_dir.clone(),
            start_stamp,
            started_at: now,
            confidence,
            state: DetectionState::Attentive,
            paused: false,
            stopped: false,
            state_interval: seconds(config.state_sample_interval_s, 1.0),
            last_state_sample: None,
        }
    }

    /// Process one frame: classify, then [`apply`](Self::apply)
    pub fn tick(&mut self, frame: &VideoFrame, now: Instant) -> TickOutcome {
        if !self.is_active() {
            return self.skipped();
        }
        let classification = self.classifier.classify(frame, self.confidence);
        self.apply(classification, now)
    }

    fn skipped(&self) -> TickOutcome {
        TickOutcome {
            state: self.state,
            skipped: true,
            ..Default::default()
        }
    }

    /// Feed one classification through the trackers and the gate
    pub fn apply(&mut self, classification: Classification, now: Instant) -> TickOutcome {
        if !self.is_active() {
            return self.skipped();
        }
        let state = classification.state;
        self.state = state;

        let mut outcome = TickOutcome {
            state,
            best: classification.best,
            ..Default::default()
        };

        self.sample_state(state, now);

        let yawn = self.yawn.update(state, now);
        outcome.yawn_pending = yawn.pending;
        if yawn.warn {
            outcome.directives.push(Directive::PlaySound {
                cue: SoundCue::YawnWarning,
                looped: false,
            });
            outcome.directives.push(Directive::yawn_warning());
        }
        if let Some(entry) = yawn.log {
            self.write(&entry);
            outcome.logs.push(entry);
        }

        let drowsy = self.drowsy.update(state, now);
        if drowsy.alert {
            outcome.directives.push(Directive::PlaySound {
                cue: SoundCue::DrowsyAlarm,
                looped: true,
            });
            outcome.directives.push(Directive::drowsy_warning());
        }
        if drowsy.alert_stopped {
            outcome.directives.push(Directive::StopSound {
                cue: SoundCue::DrowsyAlarm,
            });
        }
        if drowsy.streak_closed {
            self.gate.reset_streak();
        }
        if let Some(entry) = drowsy.log {
            self.write(&entry);
            outcome.logs.push(entry);
        }

        if let Some(streak) = drowsy.streak_duration {
            if self.gate.maybe_auto_send(streak, now) {
                outcome.emergency = Some(EmergencyRequest {
                    kind: SendKind::Auto,
                    drowsy_seconds: streak.as_secs(),
                });
            }
        }

        self.alertness.sample(state.is_drowsy(), now);
        self.tally.add(state.is_drowsy());

        outcome
    }

    fn sample_state(&mut self, state: DetectionState, now: Instant) {
        let due = self
            .last_state_sample
            .map_or(true, |last| now.saturating_duration_since(last) >= self.state_interval);
        if !due {
            return;
        }
        if let Some(log) = &self.log {
            if let Err(e) = log.append_state(state.as_str()) {
                warn!("Dropping State row: {}", e);
            }
        }
        self.last_state_sample = Some(now);
    }

    fn write(&self, entry: &LogEntry) {
        if let Some(log) = &self.log {
            log.record(entry.kind, &entry.details);
        }
    }

    pub fn pause(&mut self) {
        self.paused = true;
        info!("Detection paused");
    }

    pub fn resume(&mut self) {
        self.paused = false;
        info!("Detection resumed");
    }

    /// Flip between paused and running; returns the new paused flag
    pub fn toggle_pause(&mut self) -> bool {
        if self.paused {
            self.resume();
        } else {
            self.pause();
        }
        self.paused
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Neither paused nor stopped
    pub fn is_active(&self) -> bool {
        !self.paused && !self.stopped
    }

    /// Handle for classifying frames without holding the session
    pub fn classifier(&self) -> FrameClassifier {
        self.classifier.clone()
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// User action: clear the yawn counters
    pub fn reset_yawns(&mut self) {
        self.yawn.reset();
    }

    pub fn set_alert_threshold(&mut self, seconds: f64) {
        self.drowsy.set_alert_threshold(seconds);
    }

    /// Detector confidence threshold, must lie in `(0, 1)`
    pub fn set_confidence(&mut self, confidence: f32) -> Result<(), DmsError> {
        if !is_valid_confidence(confidence) {
            return Err(DmsError::Config(format!(
                "confidence must be in (0, 1), got {}",
                confidence
            )));
        }
        self.confidence = confidence;
        debug!("Confidence threshold set to {}", confidence);
        Ok(())
    }

    /// Manual emergency button: always approved
    pub fn manual_emergency(&self, now: Instant) -> EmergencyRequest {
        self.gate.manual_send(now);
        EmergencyRequest {
            kind: SendKind::Manual,
            drowsy_seconds: 0,
        }
    }

    /// The driver dismissed a break reminder
    pub fn record_break_dismissed(&self) {
        if let Some(log) = &self.log {
            let details = format!("Dismissed at {}", Local::now().format("%Y-%m-%dT%H:%M:%S"));
            log.record(EventKind::BreakDismissed, &details);
        }
    }

    pub fn snapshot(&self, now: Instant) -> LiveSnapshot {
        let window_remaining = self
            .gate
            .active_until()
            .map_or(0.0, |until| until.saturating_duration_since(now).as_secs_f64());

        LiveSnapshot {
            state: self.state,
            paused: self.paused,
            yawn_count: self.yawn.yawn_count(),
            drowsy_timer_s: self
                .drowsy
                .current_streak(now)
                .map_or(0.0, |d| d.as_secs_f64()),
            alertness_pct: self.alertness.score(),
            yawn_warnings: self.yawn.warning_count(),
            drowsy_warnings: self.drowsy.warning_count(),
            drowsy_alert_active: self.drowsy.is_alert_active(),
            drowsy_alert_threshold_s: self.drowsy.alert_threshold_s(),
            confidence: self.confidence,
            emergency_enabled: self.gate.is_enabled(),
            emergency_window_remaining_s: window_remaining,
        }
    }

    /// End the trip: flush the open streak, write `Trip_End` and the report.
    pub fn stop(&mut self, now: Instant) -> Result<SessionSummary, DmsError> {
        if self.stopped {
            return Err(DmsError::SessionStopped);
        }
        self.stopped = true;
        self.drowsy.flush(now);

        if let Some(log) = &self.log {
            log.record(EventKind::TripEnd, "System disengaged.");
            // Late background sends must not append to a finished trip
            log.close();
        }

        let drive_time = now.saturating_duration_since(self.started_at);
        let yawn_warnings = self.yawn.warning_count();
        let drowsy_warnings = self.drowsy.warning_count();

        let input = ReportInput {
            start_stamp: &self.start_stamp,
            log: self.log.as_ref(),
            yawn_warnings,
            drowsy_warnings,
            drive_time,
        };
        let report_path = match TripReport::write(&self.report_dir, &input) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Trip report not written: {}", e);
                None
            }
        };

        let metrics = metrics::compute(
            self.drowsy.completed_streaks(),
            self.tally,
            yawn_warnings,
            drowsy_warnings,
        );
        info!(
            "Session stopped: max streak {:.1}s, alertness {:.0}%, break {} min",
            metrics.max_drowsy_streak_s, metrics.avg_alertness_pct, metrics.recommended_break_min
        );

        Ok(SessionSummary {
            report_path,
            log_path: self.log.as_ref().map(|l| l.path().to_path_buf()),
            metrics,
            drive_time_s: drive_time.as_secs_f64(),
        })
    }

    pub fn state(&self) -> DetectionState {
        self.state
    }

    pub fn log(&self) -> Option<&EventLog> {
        self.log.as_ref()
    }

    pub fn gate(&self) -> &Arc<EmergencyGate> {
        &self.gate
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }
}

//! Drowsy streak tracking

use inference_engine::DetectionState;
use std::time::{Duration, Instant};
use storage::EventKind;
use tracing::{debug, info, warn};

use crate::analysis::LogEntry;
use crate::config::{seconds, DmsConfig};

/// Alert threshold floor (seconds)
pub const MIN_ALERT_THRESHOLD_S: f64 = 0.01;

/// Result of one drowsy update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrowsyUpdate {
    /// The alert was raised on this tick
    pub alert: bool,
    /// The alert was stopped on this tick
    pub alert_stopped: bool,
    pub log: Option<LogEntry>,
    /// Length of the open streak, when drowsy
    pub streak_duration: Option<Duration>,
    /// An open streak was closed on this tick
    pub streak_closed: bool,
}

/// Tracks continuous drowsiness.
///
/// A streak opens on the first `Drowsy` observation and closes once the
/// driver has been non-drowsy for longer than the grace period. The alert
/// latches for the rest of the streak and is released only after a longer
/// stretch of non-drowsy observation.
#[derive(Debug, Clone)]
pub struct DrowsyTracker {
    alert_threshold_s: f64,
    grace: Duration,
    stop_debounce: Duration,
    min_streak: Duration,

    streak_start: Option<Instant>,
    grace_start: Option<Instant>,
    alert_active: bool,
    alert_stop_start: Option<Instant>,
    completed_streaks: Vec<f64>,
    warning_count: u32,
}

impl DrowsyTracker {
    pub fn new(config: &DmsConfig) -> Self {
        let mut tracker = Self {
            alert_threshold_s: 6.0,
            grace: seconds(config.drowsy_grace_s, 0.01),
            stop_debounce: seconds(config.alert_stop_debounce_s, 2.0),
            min_streak: seconds(config.min_streak_s, 0.5),
            streak_start: None,
            grace_start: None,
            alert_active: false,
            alert_stop_start: None,
            completed_streaks: Vec::new(),
            warning_count: 0,
        };
        tracker.set_alert_threshold(config.drowsy_alert_threshold_s);
        tracker
    }

    pub fn update(&mut self, state: DetectionState, now: Instant) -> DrowsyUpdate {
        let mut out = DrowsyUpdate::default();

        if state.is_drowsy() {
            self.grace_start = None;
            self.alert_stop_start = None;

            let start = *self.streak_start.get_or_insert_with(|| {
                debug!("Drowsy streak started");
                now
            });
            let duration = now.saturating_duration_since(start);
            out.streak_duration = Some(duration);

            if duration.as_secs_f64() >= self.alert_threshold_s && !self.alert_active {
                self.alert_active = true;
                self.warning_count += 1;
                metrics::counter!("dms_drowsy_warnings_total").increment(1);
                warn!("Drowsy alert after {:.1}s", duration.as_secs_f64());

                out.alert = true;
                out.log = Some(LogEntry::new(
                    EventKind::DrowsyWarning,
                    format!("Drowsy for {}s.", self.alert_threshold_s),
                ));
            }
            return out;
        }

        if let Some(start) = self.streak_start {
            let grace_start = *self.grace_start.get_or_insert(now);
            if now.saturating_duration_since(grace_start) > self.grace {
                self.close_streak(grace_start.saturating_duration_since(start));
                self.streak_start = None;
                self.grace_start = None;
                out.streak_closed = true;
            }
        }

        if self.alert_active {
            let stop_start = *self.alert_stop_start.get_or_insert(now);
            if now.saturating_duration_since(stop_start) > self.stop_debounce {
                self.alert_active = false;
                self.alert_stop_start = None;
                info!("Drowsy alert cleared");

                out.alert_stopped = true;
                out.log = Some(LogEntry::new(EventKind::DrowsyReset, "Driver is attentive."));
            }
        }

        out
    }

    fn close_streak(&mut self, duration: Duration) {
        if duration > self.min_streak {
            debug!("Drowsy streak closed after {:.1}s", duration.as_secs_f64());
            self.completed_streaks.push(duration.as_secs_f64());
        }
    }

    /// Close an open streak at session stop
    pub fn flush(&mut self, now: Instant) {
        if let Some(start) = self.streak_start.take() {
            self.close_streak(now.saturating_duration_since(start));
        }
        self.grace_start = None;
    }

    /// Change the alert threshold; clamps to the floor, ignores non-finite input
    pub fn set_alert_threshold(&mut self, seconds: f64) {
        if !seconds.is_finite() {
            warn!("Ignoring non-finite drowsy alert threshold");
            return;
        }
        self.alert_threshold_s = seconds.max(MIN_ALERT_THRESHOLD_S);
    }

    pub fn alert_threshold_s(&self) -> f64 {
        self.alert_threshold_s
    }

    pub fn completed_streaks(&self) -> &[f64] {
        &self.completed_streaks
    }

    /// Length of the open streak, if any
    pub fn current_streak(&self, now: Instant) -> Option<Duration> {
        self.streak_start.map(|start| now.saturating_duration_since(start))
    }

    pub fn is_alert_active(&self) -> bool {
        self.alert_active
    }

    pub fn warning_count(&self) -> u32 {
        self.warning_count
    }
}

//! Yawn event tracking
//!
//! Counts distinct yawns (rising edges into `Yawn`) within a rolling gap,
//! and once the count reaches the threshold schedules a warning a short
//! delay later. Warnings are spaced by a cooldown.

use inference_engine::DetectionState;
use std::time::{Duration, Instant};
use storage::EventKind;
use tracing::{debug, info};

use crate::analysis::LogEntry;
use crate::config::{seconds, DmsConfig};

const DEFAULT_THRESHOLD: u32 = 5;
const DEFAULT_DELAY_S: f64 = 2.0;

/// Result of one yawn update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct YawnUpdate {
    /// A warning fired on this tick
    pub warn: bool,
    pub log: Option<LogEntry>,
    /// A warning is scheduled but not yet due
    pub pending: bool,
}

#[derive(Debug, Clone)]
pub struct YawnTracker {
    threshold: u32,
    delay: Duration,
    cooldown: Duration,
    window: Duration,

    yawn_count: u32,
    last_yawn: Option<Instant>,
    is_yawning_event: bool,
    pending_warning: Option<Instant>,
    last_warning: Option<Instant>,
    warning_count: u32,
}

impl YawnTracker {
    pub fn new(config: &DmsConfig) -> Self {
        let threshold = if config.yawn_threshold == 0 {
            DEFAULT_THRESHOLD
        } else {
            config.yawn_threshold
        };

        Self {
            threshold,
            delay: seconds(config.yawn_delay_s, DEFAULT_DELAY_S),
            cooldown: seconds(config.yawn_cooldown_s, 2.0),
            window: seconds(config.yawn_window_s, 60.0),
            yawn_count: 0,
            last_yawn: None,
            is_yawning_event: false,
            pending_warning: None,
            last_warning: None,
            warning_count: 0,
        }
    }

    pub fn update(&mut self, state: DetectionState, now: Instant) -> YawnUpdate {
        if state == DetectionState::Yawn {
            if !self.is_yawning_event {
                self.is_yawning_event = true;
                let stale = self
                    .last_yawn
                    .map_or(true, |last| now.saturating_duration_since(last) > self.window);
                self.yawn_count = if stale { 1 } else { self.yawn_count + 1 };
                self.last_yawn = Some(now);
                debug!("Yawn counted ({} in window)", self.yawn_count);
            }
        } else {
            self.is_yawning_event = false;
        }

        if let Some(mut fire_at) = self.pending_warning {
            if let Some(last) = self.last_warning {
                let ready = last + self.cooldown;
                if fire_at < ready {
                    fire_at = ready;
                    self.pending_warning = Some(ready);
                }
            }

            if now < fire_at {
                return YawnUpdate {
                    pending: true,
                    ..Default::default()
                };
            }

            self.warning_count += 1;
            self.last_warning = Some(now);
            self.pending_warning = None;
            self.yawn_count = 0;
            metrics::counter!("dms_yawn_warnings_total").increment(1);
            info!("Yawn warning #{} fired", self.warning_count);

            return YawnUpdate {
                warn: true,
                log: Some(LogEntry::new(
                    EventKind::YawnWarning,
                    format!("{} yawns detected.", self.threshold),
                )),
                pending: false,
            };
        }

        if self.yawn_count >= self.threshold {
            self.pending_warning = Some(now.checked_add(self.delay).unwrap_or(now));
            debug!("Yawn warning scheduled in {:?}", self.delay);
            return YawnUpdate {
                pending: true,
                ..Default::default()
            };
        }

        YawnUpdate::default()
    }

    /// User reset: clears the yawn count, the warning count and any
    /// scheduled warning
    pub fn reset(&mut self) {
        self.yawn_count = 0;
        self.warning_count = 0;
        self.pending_warning = None;
        info!("Yawn counter reset");
    }

    pub fn yawn_count(&self) -> u32 {
        self.yawn_count
    }

    pub fn warning_count(&self) -> u32 {
        self.warning_count
    }

    pub fn pending_warning(&self) -> Option<Instant> {
        self.pending_warning
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use DetectionState::{Attentive, Yawn};

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    /// Feed `yawns` separate yawns, 500 ms apart, starting at `t`
    fn yawn_n(tracker: &mut YawnTracker, t: Instant, yawns: u64) -> Instant {
        let mut now = t;
        for _ in 0..yawns {
            tracker.update(Yawn, now);
            now += ms(250);
            tracker.update(Attentive, now);
            now += ms(250);
        }
        now
    }

    #[test]
    fn test_warning_is_delayed() {
        let mut tracker = YawnTracker::new(&DmsConfig::default());
        let t0 = Instant::now();
        let now = yawn_n(&mut tracker, t0, 5);
        assert_eq!(tracker.yawn_count(), 5);

        // Threshold reached on the 5th yawn: scheduled, not fired
        assert!(tracker.pending_warning().is_some());
        let out = tracker.update(Attentive, now);
        assert!(out.pending && !out.warn);

        let fire_at = tracker.pending_warning().unwrap();
        let out = tracker.update(Attentive, fire_at);
        assert!(out.warn);
        let log = out.log.unwrap();
        assert_eq!(log.kind, EventKind::YawnWarning);
        assert_eq!(log.details, "5 yawns detected.");
        assert_eq!(tracker.yawn_count(), 0);
        assert_eq!(tracker.warning_count(), 1);
    }

    #[test]
    fn test_held_yawn_counts_once() {
        let mut tracker = YawnTracker::new(&DmsConfig::default());
        let t0 = Instant::now();
        for i in 0..50 {
            tracker.update(Yawn, t0 + ms(i * 30));
        }
        assert_eq!(tracker.yawn_count(), 1);
    }

    #[test]
    fn test_count_restarts_after_gap() {
        let mut tracker = YawnTracker::new(&DmsConfig::default());
        let t0 = Instant::now();
        let now = yawn_n(&mut tracker, t0, 3);
        assert_eq!(tracker.yawn_count(), 3);

        tracker.update(Yawn, now + Duration::from_secs(61));
        assert_eq!(tracker.yawn_count(), 1);
    }

    #[test]
    fn test_cooldown_pushes_pending_warning() {
        let cfg = DmsConfig {
            yawn_threshold: 1,
            yawn_delay_s: 0.0,
            yawn_cooldown_s: 10.0,
            ..Default::default()
        };
        let mut tracker = YawnTracker::new(&cfg);
        let t0 = Instant::now();

        tracker.update(Yawn, t0);
        assert!(tracker.update(Attentive, t0 + ms(100)).warn);

        tracker.update(Yawn, t0 + ms(200));
        let out = tracker.update(Attentive, t0 + ms(300));
        assert!(out.pending);
        assert_eq!(tracker.pending_warning(), Some(t0 + ms(100) + Duration::from_secs(10)));

        assert!(!tracker.update(Attentive, t0 + Duration::from_secs(5)).warn);
        assert!(tracker.update(Attentive, t0 + Duration::from_secs(11)).warn);
        assert_eq!(tracker.warning_count(), 2);
    }

    #[test]
    fn test_invalid_settings_fall_back() {
        let cfg = DmsConfig {
            yawn_threshold: 0,
            yawn_delay_s: f64::NAN,
            ..Default::default()
        };
        let tracker = YawnTracker::new(&cfg);
        assert_eq!(tracker.threshold, 5);
        assert_eq!(tracker.delay, Duration::from_secs(2));
    }

    #[test]
    fn test_reset() {
        let mut tracker = YawnTracker::new(&DmsConfig::default());
        let t0 = Instant::now();
        let now = yawn_n(&mut tracker, t0, 5);
        tracker.reset();
        assert_eq!(tracker.yawn_count(), 0);
        assert_eq!(tracker.warning_count(), 0);
        assert!(!tracker.update(Attentive, now + Duration::from_secs(5)).warn);
    }

    proptest! {
        #[test]
        fn count_is_zero_after_warning(states in proptest::collection::vec(any::<bool>(), 1..400)) {
            let cfg = DmsConfig { yawn_threshold: 2, ..Default::default() };
            let mut tracker = YawnTracker::new(&cfg);
            let t0 = Instant::now();
            for (i, yawning) in states.into_iter().enumerate() {
                let state = if yawning { Yawn } else { Attentive };
                let out = tracker.update(state, t0 + ms(i as u64 * 100));
                if out.warn {
                    prop_assert_eq!(tracker.yawn_count(), 0);
                }
            }
        }
    }
}

//! Emergency notifier gate

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Longest accepted active window (one day)
pub const MAX_ACTIVE_WINDOW_MIN: u64 = 24 * 60;

const MAX_THRESHOLD_S: f64 = 86_400.0;

/// Gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Continuous drowsiness before an automated send (seconds, default: 25)
    pub emergency_threshold_s: f64,
    /// No further automated sends for this long after an attempt (minutes, default: 15)
    pub active_window_min: u64,
    /// Automated sends enabled at startup
    pub enabled: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            emergency_threshold_s: 25.0,
            active_window_min: 15,
            enabled: true,
        }
    }
}

/// Decides when an emergency message may go out.
///
/// Shared between the tick loop and background send tasks. `active_until`
/// is kept as milliseconds past the gate's origin instant so it fits in an
/// atomic; zero means "never sent".
#[derive(Debug)]
pub struct EmergencyGate {
    origin: Instant,
    active_until_ms: AtomicU64,
    enabled: AtomicBool,
    sent_for_current_streak: AtomicBool,
    threshold: Duration,
    window: Duration,
}

impl EmergencyGate {
    pub fn new(config: &GateConfig) -> Self {
        Self::with_origin(config, Instant::now())
    }

    /// Gate whose clock starts at `origin` (instants before it read as origin)
    pub fn with_origin(config: &GateConfig, origin: Instant) -> Self {
        let threshold_s = if config.emergency_threshold_s.is_finite() && config.emergency_threshold_s >= 0.0 {
            config.emergency_threshold_s.min(MAX_THRESHOLD_S)
        } else {
            GateConfig::default().emergency_threshold_s
        };
        let window_min = config.active_window_min.min(MAX_ACTIVE_WINDOW_MIN);
        if window_min < config.active_window_min {
            warn!("Active window capped at {} minutes", MAX_ACTIVE_WINDOW_MIN);
        }

        Self {
            origin,
            active_until_ms: AtomicU64::new(0),
            enabled: AtomicBool::new(config.enabled),
            sent_for_current_streak: AtomicBool::new(false),
            threshold: Duration::try_from_secs_f64(threshold_s).unwrap_or_default(),
            window: Duration::from_secs(window_min * 60),
        }
    }

    fn offset_ms(&self, at: Instant) -> u64 {
        at.saturating_duration_since(self.origin).as_millis() as u64
    }

    fn window_ms(&self) -> u64 {
        self.window.as_millis() as u64
    }

    /// Claim an automated send for the current drowsy streak.
    ///
    /// Returns `true` iff the caller should start a send attempt. A
    /// successful claim moves `active_until` to `now + window` and marks
    /// the streak as served.
    pub fn maybe_auto_send(&self, streak_duration: Duration, now: Instant) -> bool {
        if !self.enabled.load(Ordering::Acquire) {
            return false;
        }
        if streak_duration < self.threshold {
            return false;
        }
        if self.sent_for_current_streak.load(Ordering::Acquire) {
            return false;
        }

        let now_ms = self.offset_ms(now);
        let until = now_ms.saturating_add(self.window_ms());
        let mut current = self.active_until_ms.load(Ordering::Acquire);
        loop {
            if now_ms < current {
                debug!("Automated send suppressed: active window not expired");
                return false;
            }
            match self.active_until_ms.compare_exchange_weak(
                current,
                until,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        self.sent_for_current_streak.store(true, Ordering::Release);
        metrics::counter!("dms_emergency_claims_total", "kind" => "auto").increment(1);
        info!("Automated emergency send claimed after {:.1}s drowsy", streak_duration.as_secs_f64());
        true
    }

    /// Manual override: ignores the toggle and the duration threshold,
    /// always attempts, and pushes `active_until` forward.
    pub fn manual_send(&self, now: Instant) -> bool {
        let until = self.offset_ms(now).saturating_add(self.window_ms());
        self.active_until_ms.fetch_max(until, Ordering::AcqRel);
        metrics::counter!("dms_emergency_claims_total", "kind" => "manual").increment(1);
        info!("Manual emergency send requested");
        true
    }

    /// Restart the active window from the moment an attempt finished
    pub fn record_attempt_finished(&self, at: Instant) {
        let until = self.offset_ms(at).saturating_add(self.window_ms());
        self.active_until_ms.fetch_max(until, Ordering::AcqRel);
    }

    /// Toggle automated sends (manual sends are unaffected)
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
        info!("Automated emergency sends {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// The drowsy streak ended; the next streak may claim again
    pub fn reset_streak(&self) {
        self.sent_for_current_streak.store(false, Ordering::Release);
    }

    pub fn sent_for_current_streak(&self) -> bool {
        self.sent_for_current_streak.load(Ordering::Acquire)
    }

    /// Forget the active window entirely
    pub fn clear_active_window(&self) {
        self.active_until_ms.store(0, Ordering::Release);
    }

    /// End of the active window, `None` if nothing was ever sent
    pub fn active_until(&self) -> Option<Instant> {
        match self.active_until_ms.load(Ordering::Acquire) {
            0 => None,
            ms => self.origin.checked_add(Duration::from_millis(ms)),
        }
    }

    /// Whether automated sends are currently held back by the window
    pub fn is_window_active(&self, now: Instant) -> bool {
        self.offset_ms(now) < self.active_until_ms.load(Ordering::Acquire)
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

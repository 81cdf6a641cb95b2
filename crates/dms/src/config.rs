//! DMS configuration

use alerting::GateConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// DMS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    /// Yawns within the window that trigger a warning
    pub yawn_threshold: u32,

    /// Delay between crossing the yawn threshold and the warning (seconds)
    pub yawn_delay_s: f64,

    /// Minimum spacing between two yawn warnings (seconds)
    pub yawn_cooldown_s: f64,

    /// A yawn this long after the previous one restarts the count (seconds)
    pub yawn_window_s: f64,

    /// Continuous drowsiness before the audible alert (seconds, floor 0.01)
    pub drowsy_alert_threshold_s: f64,

    /// Non-drowsy time that closes an open streak (seconds)
    pub drowsy_grace_s: f64,

    /// Non-drowsy time before an active alert is stopped (seconds)
    pub alert_stop_debounce_s: f64,

    /// Shorter completed streaks are discarded (seconds)
    pub min_streak_s: f64,

    /// Rolling alertness window (seconds)
    pub alertness_window_s: f64,

    /// Detector confidence threshold
    pub confidence: f32,

    /// Minimum spacing of `State` rows in the trip log (seconds)
    pub state_sample_interval_s: f64,

    /// Emergency notifier gate
    pub gate: GateConfig,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            yawn_threshold: 5,
            yawn_delay_s: 2.0,
            yawn_cooldown_s: 2.0,
            yawn_window_s: 60.0,
            drowsy_alert_threshold_s: 6.0,
            drowsy_grace_s: 0.01,
            alert_stop_debounce_s: 2.0,
            min_streak_s: 0.5,
            alertness_window_s: 30.0,
            confidence: 0.4,
            state_sample_interval_s: 1.0,
            gate: GateConfig::default(),
        }
    }
}

impl DmsConfig {
    /// Create strict config (lower thresholds)
    pub fn strict() -> Self {
        Self {
            yawn_threshold: 3,
            drowsy_alert_threshold_s: 3.0,
            gate: GateConfig {
                emergency_threshold_s: 15.0,
                ..GateConfig::default()
            },
            ..Default::default()
        }
    }

    /// Create lenient config (higher thresholds)
    pub fn lenient() -> Self {
        Self {
            yawn_threshold: 8,
            drowsy_alert_threshold_s: 10.0,
            gate: GateConfig {
                emergency_threshold_s: 40.0,
                ..GateConfig::default()
            },
            ..Default::default()
        }
    }
}

/// Longest timer a config value may ask for
pub(crate) const MAX_TIMER_S: f64 = 86_400.0;

/// Seconds to `Duration`. Negative, NaN or infinite input gives `fallback`;
/// finite values are capped at one day.
pub(crate) fn seconds(value: f64, fallback: f64) -> Duration {
    let secs = if value.is_finite() && value >= 0.0 {
        value.min(MAX_TIMER_S)
    } else {
        fallback
    };
    Duration::try_from_secs_f64(secs).unwrap_or_default()
}

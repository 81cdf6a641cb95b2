//! End-of-session fatigue metrics

use serde::{Deserialize, Serialize};

use crate::alertness::AlertnessTally;

/// Fatigue summary computed when a session stops
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub max_drowsy_streak_s: f64,
    pub avg_alertness_pct: f64,
    /// One of 20, 40 or 90
    pub recommended_break_min: u32,
    pub yawn_warnings: u32,
    pub drowsy_warnings: u32,
}

/// Reduce the session's collected data to a summary
pub fn compute(
    completed_streaks: &[f64],
    alertness: AlertnessTally,
    yawn_warnings: u32,
    drowsy_warnings: u32,
) -> SessionMetrics {
    let max_drowsy_streak_s = completed_streaks
        .iter()
        .copied()
        .filter(|s| s.is_finite())
        .fold(0.0_f64, f64::max);
    let avg_alertness_pct = alertness.score();

    let recommended_break_min = if avg_alertness_pct < 50.0 || max_drowsy_streak_s > 30.0 {
        20
    } else if avg_alertness_pct < 70.0 {
        40
    } else {
        90
    };

    SessionMetrics {
        max_drowsy_streak_s,
        avg_alertness_pct,
        recommended_break_min,
        yawn_warnings,
        drowsy_warnings,
    }
}

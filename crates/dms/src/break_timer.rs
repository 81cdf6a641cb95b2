//! Break reminders based on continuous driving time

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// How often the reminder task polls
pub const BREAK_POLL_INTERVAL: Duration = Duration::from_secs(10);

const HOUR_S: u64 = 3600;

/// Night is 18:00 up to (not including) 06:30
pub fn is_night(time: NaiveTime) -> bool {
    let minute_of_day = time.hour() * 60 + time.minute();
    minute_of_day >= 18 * 60 || minute_of_day < 6 * 60 + 30
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakPrompt {
    /// Night, between one and two hours
    Brief,
    Full,
}

impl BreakPrompt {
    pub fn message(&self) -> &'static str {
        match self {
            BreakPrompt::Brief => "More than an hour driving. Consider a short rest.",
            BreakPrompt::Full => "Please take a break now.",
        }
    }
}

/// What the driver chose in the reminder dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakAction {
    /// Stop the session
    TakeBreak,
    Snooze,
    Dismiss,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakStatus {
    pub elapsed_s: u64,
    /// Seconds until the next prompt, 0 when one is due
    pub next_prompt_s: u64,
    pub is_night: bool,
    pub prompt: Option<BreakPrompt>,
}

#[derive(Debug, Clone)]
pub struct BreakTimer {
    started: Instant,
    snooze_until: Option<Instant>,
}

impl BreakTimer {
    pub fn new(now: Instant) -> Self {
        Self {
            started: now,
            snooze_until: None,
        }
    }

    /// Evaluate at `now` with wall-clock time of day `clock`.
    /// Returns `None` while snoozed.
    pub fn check(&self, now: Instant, clock: NaiveTime) -> Option<BreakStatus> {
        if self.snooze_until.is_some_and(|until| now < until) {
            return None;
        }

        let elapsed = now.saturating_duration_since(self.started).as_secs();
        let night = is_night(clock);

        let (next_prompt_s, prompt) = if night {
            if elapsed > HOUR_S && elapsed < 2 * HOUR_S {
                (2 * HOUR_S - elapsed, Some(BreakPrompt::Brief))
            } else if elapsed >= 2 * HOUR_S {
                (0, Some(BreakPrompt::Full))
            } else {
                (HOUR_S - elapsed, None)
            }
        } else if elapsed >= 3 * HOUR_S {
            (0, Some(BreakPrompt::Full))
        } else {
            (3 * HOUR_S - elapsed, None)
        };

        if let Some(p) = prompt {
            debug!("Break prompt due ({:?}) after {}s", p, elapsed);
        }

        Some(BreakStatus {
            elapsed_s: elapsed,
            next_prompt_s,
            is_night: night,
            prompt,
        })
    }

    /// Suppress prompts for `minutes`; the driving clock keeps running
    pub fn snooze(&mut self, minutes: u64, now: Instant) {
        self.snooze_until = Some(now + Duration::from_secs(minutes.saturating_mul(60)));
        info!("Break reminder snoozed for {} min", minutes);
    }

    /// Restart the driving clock
    pub fn acknowledge(&mut self, now: Instant) {
        self.started = now;
        self.snooze_until = None;
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn hours(h: f64) -> Duration {
        Duration::from_secs_f64(h * 3600.0)
    }

    #[test]
    fn test_night_boundaries() {
        assert!(is_night(hm(18, 0)));
        assert!(is_night(hm(23, 59)));
        assert!(is_night(hm(6, 29)));
        assert!(!is_night(hm(6, 30)));
        assert!(!is_night(hm(17, 59)));
    }

    #[test]
    fn test_day_prompts() {
        let t0 = Instant::now();
        let timer = BreakTimer::new(t0);

        let status = timer.check(t0 + hours(1.5), hm(12, 0)).unwrap();
        assert!(!status.is_night);
        assert_eq!(status.prompt, None);
        assert_eq!(status.next_prompt_s, 3 * 3600 - 5400);

        let status = timer.check(t0 + hours(3.0), hm(12, 0)).unwrap();
        assert_eq!(status.prompt, Some(BreakPrompt::Full));
        assert_eq!(status.next_prompt_s, 0);
    }

    #[test]
    fn test_night_prompts() {
        let t0 = Instant::now();
        let timer = BreakTimer::new(t0);

        let status = timer.check(t0 + hours(0.5), hm(22, 0)).unwrap();
        assert_eq!(status.prompt, None);
        assert_eq!(status.next_prompt_s, 1800);

        let status = timer.check(t0 + hours(1.5), hm(22, 0)).unwrap();
        assert_eq!(status.prompt, Some(BreakPrompt::Brief));
        assert_eq!(status.next_prompt_s, 1800);

        let status = timer.check(t0 + hours(2.0), hm(2, 0)).unwrap();
        assert_eq!(status.prompt, Some(BreakPrompt::Full));
    }

    #[test]
    fn test_snooze_and_acknowledge() {
        let t0 = Instant::now();
        let mut timer = BreakTimer::new(t0);
        let t = t0 + hours(3.0);

        timer.snooze(15, t);
        assert!(timer.check(t + Duration::from_secs(60), hm(12, 0)).is_none());
        let status = timer.check(t + Duration::from_secs(15 * 60), hm(12, 0)).unwrap();
        assert_eq!(status.prompt, Some(BreakPrompt::Full));

        timer.acknowledge(t);
        let status = timer.check(t + Duration::from_secs(10), hm(12, 0)).unwrap();
        assert_eq!(status.elapsed_s, 10);
        assert_eq!(status.prompt, None);
    }
}

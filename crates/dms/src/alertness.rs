//! Rolling alertness estimate

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Sliding window of `(timestamp, was_drowsy)` samples
#[derive(Debug, Clone)]
pub struct AlertnessWindow {
    window: Duration,
    samples: VecDeque<(Instant, bool)>,
}

impl AlertnessWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            samples: VecDeque::new(),
        }
    }

    /// Append a sample and evict entries older than the window
    pub fn sample(&mut self, is_drowsy: bool, now: Instant) {
        self.samples.push_back((now, is_drowsy));
        while let Some(&(ts, _)) = self.samples.front() {
            if now.saturating_duration_since(ts) > self.window {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Percentage of non-drowsy samples in the window; 100 when empty
    pub fn score(&self) -> f64 {
        self.samples.iter().map(|&(_, drowsy)| drowsy).collect::<AlertnessTally>().score()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Running drowsy/total counts over a whole session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertnessTally {
    pub total: u64,
    pub drowsy: u64,
}

impl AlertnessTally {
    pub fn add(&mut self, is_drowsy: bool) {
        self.total += 1;
        if is_drowsy {
            self.drowsy += 1;
        }
    }

    /// `100 * (1 - drowsy / total)`, 100 when no samples
    pub fn score(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        100.0 * (1.0 - self.drowsy as f64 / self.total as f64)
    }
}

impl FromIterator<bool> for AlertnessTally {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        let mut tally = Self::default();
        for drowsy in iter {
            tally.add(drowsy);
        }
        tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_is_fully_alert() {
        let window = AlertnessWindow::new(Duration::from_secs(30));
        assert_eq!(window.score(), 100.0);
    }

    #[test]
    fn test_all_drowsy_scores_zero() {
        let mut window = AlertnessWindow::new(Duration::from_secs(30));
        let t0 = Instant::now();
        for i in 0..100 {
            window.sample(true, t0 + Duration::from_millis(i * 300));
        }
        assert_eq!(window.score(), 0.0);
    }

    #[test]
    fn test_old_samples_evicted() {
        let mut window = AlertnessWindow::new(Duration::from_secs(30));
        let t0 = Instant::now();
        for i in 0..10 {
            window.sample(true, t0 + Duration::from_secs(i));
        }
        // 31 s after the first sample: everything up to t0+0 is evicted
        window.sample(false, t0 + Duration::from_secs(31));
        assert_eq!(window.len(), 10);
        assert!((window.score() - 10.0).abs() < 1e-9);

        window.sample(false, t0 + Duration::from_secs(100));
        assert_eq!(window.len(), 1);
        assert_eq!(window.score(), 100.0);
    }

    #[test]
    fn test_tally_half() {
        let tally: AlertnessTally = [true, false, true, false].into_iter().collect();
        assert_eq!(tally.score(), 50.0);
    }

    proptest! {
        #[test]
        fn score_in_range(samples in proptest::collection::vec(any::<bool>(), 0..200)) {
            let mut window = AlertnessWindow::new(Duration::from_secs(30));
            let t0 = Instant::now();
            for (i, s) in samples.iter().enumerate() {
                window.sample(*s, t0 + Duration::from_millis(i as u64 * 250));
            }
            let score = window.score();
            prop_assert!((0.0..=100.0).contains(&score));
        }
    }
}

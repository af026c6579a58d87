//! Dropped-tick and spare-time accounting.

use std::time::{Duration, Instant};

use crate::HEADROOM_WINDOW;

/// Render loop health counters.
///
/// Spare time is the slack left between the end of a tick's work and its
/// deadline; a dropped tick contributes zero. The minimum is tracked over
/// one-second windows so a single slow tick does not hide forever.
#[derive(Debug, Clone)]
pub struct HeadroomMetrics {
    /// Ticks completed
    pub total_ticks: u64,

    /// Ticks that finished past their deadline
    pub dropped_ticks: u64,

    /// Overrun of the most recent dropped tick
    pub last_overrun: Duration,

    window_start: Instant,
    window_min: Duration,
    completed_window_min: Option<Duration>,
}

impl HeadroomMetrics {
    /// Create counters whose first window starts at `now`.
    pub fn new(now: Instant) -> Self {
        Self {
            total_ticks: 0,
            dropped_ticks: 0,
            last_overrun: Duration::ZERO,
            window_start: now,
            window_min: HEADROOM_WINDOW,
            completed_window_min: None,
        }
    }

    /// Record one finished tick.
    pub fn record_tick(&mut self, spare: Duration, dropped: bool, now: Instant) {
        self.total_ticks = self.total_ticks.saturating_add(1);
        if dropped {
            self.dropped_ticks = self.dropped_ticks.saturating_add(1);
        }
        self.window_min = self.window_min.min(spare);

        if now.saturating_duration_since(self.window_start) > HEADROOM_WINDOW {
            self.completed_window_min = Some(self.window_min);
            self.window_min = HEADROOM_WINDOW;
            self.window_start = now;
        }
    }

    /// Record the overrun of a dropped tick.
    pub fn record_overrun(&mut self, overrun: Duration) {
        self.last_overrun = overrun;
    }

    /// Smallest spare time seen in the last full window, or in the current
    /// window before the first one completes.
    pub fn spare_time_min(&self) -> Duration {
        self.completed_window_min.unwrap_or(self.window_min)
    }

    /// Fraction of ticks dropped (0.0 to 1.0).
    pub fn dropped_rate(&self) -> f64 {
        if self.total_ticks == 0 {
            0.0
        } else {
            self.dropped_ticks as f64 / self.total_ticks as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metrics_are_idle() {
        let metrics = HeadroomMetrics::new(Instant::now());
        assert_eq!(metrics.total_ticks, 0);
        assert_eq!(metrics.dropped_ticks, 0);
        assert_eq!(metrics.spare_time_min(), HEADROOM_WINDOW);
        assert!(metrics.dropped_rate().abs() < f64::EPSILON);
    }

    #[test]
    fn test_minimum_within_window() {
        let start = Instant::now();
        let mut metrics = HeadroomMetrics::new(start);
        metrics.record_tick(Duration::from_millis(30), false, start);
        metrics.record_tick(Duration::from_millis(12), false, start);
        metrics.record_tick(Duration::from_millis(40), false, start);
        assert_eq!(metrics.spare_time_min(), Duration::from_millis(12));
    }

    #[test]
    fn test_window_rolls_after_one_second() {
        let start = Instant::now();
        let mut metrics = HeadroomMetrics::new(start);
        metrics.record_tick(Duration::ZERO, true, start);

        let later = start + Duration::from_millis(1_100);
        metrics.record_tick(Duration::from_millis(20), false, later);
        // completed window saw the dropped tick
        assert_eq!(metrics.spare_time_min(), Duration::ZERO);

        let much_later = later + Duration::from_millis(1_100);
        metrics.record_tick(Duration::from_millis(25), false, much_later);
        assert_eq!(metrics.spare_time_min(), Duration::from_millis(25));
        assert_eq!(metrics.dropped_ticks, 1);
        assert_eq!(metrics.total_ticks, 3);
    }
}

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Width of the trailing window used for realtime rates, in milliseconds.
pub const REALTIME_WINDOW_MS: u64 = 1000;

/// Cumulative value sums, one bucket per outcome plus the running total.
///
/// `hp_lessen` is a side channel carrying effective damage (the part that
/// actually reduced the target's HP), distinct from the nominal value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueBreakdown {
    pub normal: u64,
    pub critical: u64,
    pub lucky: u64,
    pub crit_lucky: u64,
    pub hp_lessen: u64,
    pub total: u64,
}

/// Event counts per outcome.
///
/// Critical and lucky counts are independent: an event that is both
/// increments `critical`, `lucky` and `crit_lucky`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountBreakdown {
    pub normal: u64,
    pub critical: u64,
    pub lucky: u64,
    pub crit_lucky: u64,
    pub total: u64,
}

impl CountBreakdown {
    pub fn merged(&self, other: &CountBreakdown) -> CountBreakdown {
        CountBreakdown {
            normal: self.normal + other.normal,
            critical: self.critical + other.critical,
            lucky: self.lucky + other.lucky,
            crit_lucky: self.crit_lucky + other.crit_lucky,
            total: self.total + other.total,
        }
    }
}

/// Instantaneous value over the trailing window and its historical peak.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeStats {
    pub value: u64,
    pub max: u64,
}

/// Metric accumulator with cumulative totals and a trailing 1s window.
///
/// Inserts are cheap: the window is only pruned and re-summed by
/// [`SlidingWindowCounter::update_realtime_stats`], which the owner calls on a
/// periodic tick.
///
/// # Examples
/// ```
/// use dpsshark_core::SlidingWindowCounter;
///
/// let mut counter = SlidingWindowCounter::new();
/// counter.add_record(0, 10, false, false, 0);
/// counter.add_record(900, 5, true, false, 0);
/// counter.update_realtime_stats(950);
/// assert_eq!(counter.realtime().value, 15);
/// counter.update_realtime_stats(1100);
/// assert_eq!(counter.realtime().value, 5);
/// assert_eq!(counter.realtime().max, 15);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SlidingWindowCounter {
    stats: ValueBreakdown,
    count: CountBreakdown,
    window: VecDeque<(u64, u64)>,
    first_event_ms: Option<u64>,
    last_event_ms: Option<u64>,
    realtime: RealtimeStats,
}

impl SlidingWindowCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one event observed at `now_ms`.
    pub fn add_record(&mut self, now_ms: u64, value: u64, is_crit: bool, is_lucky: bool, extra: u64) {
        match (is_crit, is_lucky) {
            (true, true) => self.stats.crit_lucky += value,
            (true, false) => self.stats.critical += value,
            (false, true) => self.stats.lucky += value,
            (false, false) => self.stats.normal += value,
        }
        self.stats.total += value;
        self.stats.hp_lessen += extra;

        if is_crit {
            self.count.critical += 1;
        }
        if is_lucky {
            self.count.lucky += 1;
        }
        if is_crit && is_lucky {
            self.count.crit_lucky += 1;
        }
        if !is_crit && !is_lucky {
            self.count.normal += 1;
        }
        self.count.total += 1;

        self.window.push_back((now_ms, value));

        // The range only becomes complete with a second event.
        if self.first_event_ms.is_none() {
            self.first_event_ms = Some(now_ms);
        } else {
            self.last_event_ms = Some(now_ms);
        }
    }

    /// Prune samples older than the window and refresh value/max.
    pub fn update_realtime_stats(&mut self, now_ms: u64) {
        while let Some(&(ts, _)) = self.window.front() {
            if now_ms.saturating_sub(ts) > REALTIME_WINDOW_MS {
                self.window.pop_front();
            } else {
                break;
            }
        }

        self.realtime.value = self.window.iter().map(|(_, value)| value).sum();
        if self.realtime.value > self.realtime.max {
            self.realtime.max = self.realtime.value;
        }
    }

    /// Average total per second across the observed time range.
    ///
    /// Returns 0 when fewer than two events were recorded or when every event
    /// carries the same timestamp.
    pub fn total_per_second(&self) -> f64 {
        let (Some(first), Some(last)) = (self.first_event_ms, self.last_event_ms) else {
            return 0.0;
        };
        let elapsed = last.saturating_sub(first);
        if elapsed == 0 {
            return 0.0;
        }
        let rate = self.stats.total as f64 / elapsed as f64 * 1000.0;
        if rate.is_finite() { rate } else { 0.0 }
    }

    /// Drop pending window samples without touching cumulative totals.
    pub fn clear_window(&mut self) {
        self.window.clear();
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn stats(&self) -> &ValueBreakdown {
        &self.stats
    }

    pub fn count(&self) -> &CountBreakdown {
        &self.count
    }

    pub fn realtime(&self) -> RealtimeStats {
        self.realtime
    }

    pub fn time_range(&self) -> (Option<u64>, Option<u64>) {
        (self.first_event_ms, self.last_event_ms)
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }
}

#[cfg(test)]
mod tests {
    use super::SlidingWindowCounter;

    #[test]
    fn buckets_follow_crit_and_lucky_flags() {
        let mut counter = SlidingWindowCounter::new();
        counter.add_record(0, 10, false, false, 1);
        counter.add_record(1, 20, true, false, 2);
        counter.add_record(2, 30, false, true, 3);
        counter.add_record(3, 40, true, true, 4);

        let stats = counter.stats();
        assert_eq!(stats.normal, 10);
        assert_eq!(stats.critical, 20);
        assert_eq!(stats.lucky, 30);
        assert_eq!(stats.crit_lucky, 40);
        assert_eq!(stats.total, 100);
        assert_eq!(stats.hp_lessen, 10);

        let count = counter.count();
        assert_eq!(count.normal, 1);
        assert_eq!(count.critical, 2);
        assert_eq!(count.lucky, 2);
        assert_eq!(count.crit_lucky, 1);
        assert_eq!(count.total, 4);
    }

    #[test]
    fn window_prunes_old_samples_and_keeps_max() {
        let mut counter = SlidingWindowCounter::new();
        counter.add_record(0, 10, false, false, 0);
        counter.add_record(900, 5, false, false, 0);

        counter.update_realtime_stats(950);
        assert_eq!(counter.realtime().value, 15);
        assert_eq!(counter.realtime().max, 15);

        counter.update_realtime_stats(1100);
        assert_eq!(counter.realtime().value, 5);
        assert_eq!(counter.realtime().max, 15);

        counter.update_realtime_stats(5000);
        assert_eq!(counter.realtime().value, 0);
        assert_eq!(counter.realtime().max, 15);
        assert_eq!(counter.window_len(), 0);
    }

    #[test]
    fn sample_exactly_one_window_old_is_kept() {
        let mut counter = SlidingWindowCounter::new();
        counter.add_record(0, 7, false, false, 0);
        counter.update_realtime_stats(1000);
        assert_eq!(counter.realtime().value, 7);
    }

    #[test]
    fn single_event_rate_is_zero() {
        let mut counter = SlidingWindowCounter::new();
        counter.add_record(500, 100, false, false, 0);
        assert_eq!(counter.total_per_second(), 0.0);
    }

    #[test]
    fn simultaneous_events_rate_is_zero() {
        let mut counter = SlidingWindowCounter::new();
        counter.add_record(500, 100, false, false, 0);
        counter.add_record(500, 100, false, false, 0);
        assert_eq!(counter.total_per_second(), 0.0);
    }

    #[test]
    fn rate_uses_first_and_last_event() {
        let mut counter = SlidingWindowCounter::new();
        counter.add_record(1_000, 100, false, false, 0);
        counter.add_record(2_000, 100, false, false, 0);
        counter.add_record(3_000, 200, false, false, 0);
        assert!((counter.total_per_second() - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn reset_clears_everything() {
        let mut counter = SlidingWindowCounter::new();
        counter.add_record(0, 10, true, true, 3);
        counter.update_realtime_stats(10);
        counter.reset();
        assert_eq!(counter.stats().total, 0);
        assert_eq!(counter.count().total, 0);
        assert_eq!(counter.realtime().max, 0);
        assert_eq!(counter.time_range(), (None, None));
    }
}

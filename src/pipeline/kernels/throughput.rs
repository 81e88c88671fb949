//! Stage-local throughput sampling.

use std::time::{Duration, Instant};

/// Counts items and reports a rate every `interval` items.
#[derive(Debug, Clone)]
pub struct ThroughputMeter {
    label: String,
    interval: u64,
    count: u64,
    window_count: u64,
    started: Option<Instant>,
    window_started: Option<Instant>,
    last_rate: Option<f64>,
}

impl ThroughputMeter {
    /// An `interval` of zero disables periodic samples; totals are still kept.
    pub fn new(label: impl Into<String>, interval: u64) -> Self {
        Self {
            label: label.into(),
            interval,
            count: 0,
            window_count: 0,
            started: None,
            window_started: None,
            last_rate: None,
        }
    }

    /// Record one item. Returns the items-per-second rate of the window
    /// that this item completes, if any.
    pub fn record(&mut self) -> Option<f64> {
        self.record_at(Instant::now())
    }

    fn record_at(&mut self, now: Instant) -> Option<f64> {
        let window_started = *self.window_started.get_or_insert(now);
        self.started.get_or_insert(now);
        self.count += 1;
        self.window_count += 1;

        if self.interval == 0 || self.window_count < self.interval {
            return None;
        }

        let rate = rate(self.window_count, now.duration_since(window_started));
        tracing::info!(
            "{}: {:.1} items/s over the last {} items",
            self.label,
            rate,
            self.window_count
        );
        self.window_count = 0;
        self.window_started = Some(now);
        self.last_rate = Some(rate);
        Some(rate)
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Rate of the most recent completed window.
    pub fn last_rate(&self) -> Option<f64> {
        self.last_rate
    }

    /// Average rate since the first recorded item.
    pub fn overall_rate(&self) -> Option<f64> {
        let started = self.started?;
        Some(rate(self.count, started.elapsed()))
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

fn rate(items: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        items as f64 / secs
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_every_interval() {
        let mut meter = ThroughputMeter::new("frames", 4);
        let t0 = Instant::now();

        for i in 0..3 {
            assert!(meter.record_at(t0 + Duration::from_millis(i * 250)).is_none());
        }
        let rate = meter.record_at(t0 + Duration::from_secs(2)).unwrap();
        assert!((rate - 2.0).abs() < 1e-9);
        assert_eq!(meter.last_rate(), Some(rate));

        // The next window starts at the sample.
        for i in 1..4 {
            assert!(meter
                .record_at(t0 + Duration::from_millis(2000 + i * 250))
                .is_none());
        }
        let rate = meter.record_at(t0 + Duration::from_secs(3)).unwrap();
        assert!((rate - 4.0).abs() < 1e-9);
        assert_eq!(meter.count(), 8);
    }

    #[test]
    fn test_zero_interval_only_counts() {
        let mut meter = ThroughputMeter::new("frames", 0);
        for _ in 0..10 {
            assert!(meter.record().is_none());
        }
        assert_eq!(meter.count(), 10);
        assert!(meter.last_rate().is_none());
        assert!(meter.overall_rate().is_some());
    }

    #[test]
    fn test_no_rate_before_first_item() {
        let meter = ThroughputMeter::new("frames", 10);
        assert!(meter.overall_rate().is_none());
        assert_eq!(meter.label(), "frames");
    }
}

//! Load-reporting statistics for stepping passes.
//!
//! All durations are milliseconds as `f64`.

use std::time::Duration;

use ts_core::AgentKind;

/// Running min / max / mean over recorded samples.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TimingStats {
    count: u64,
    min:   f64,
    max:   f64,
    total: f64,
}

impl TimingStats {
    pub fn record(&mut self, elapsed: Duration) {
        self.record_ms(elapsed.as_secs_f64() * 1_000.0);
    }

    pub fn record_ms(&mut self, ms: f64) {
        if self.count == 0 {
            self.min = ms;
            self.max = ms;
        } else {
            self.min = self.min.min(ms);
            self.max = self.max.max(ms);
        }
        self.total += ms;
        self.count += 1;
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Smallest sample, `0.0` when empty.
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Largest sample, `0.0` when empty.
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Mean sample, `0.0` when empty.
    pub fn mean(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.total / self.count as f64 }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Stats over one batch of samples.
    pub fn from_samples(samples: impl IntoIterator<Item = Duration>) -> Self {
        let mut stats = Self::default();
        for s in samples {
            stats.record(s);
        }
        stats
    }
}

/// Per-kind accumulators held by the stepping scheduler.
#[derive(Clone, Debug, Default)]
pub struct KindStats {
    /// Completed passes since the scheduler was built.  Never reset.
    pub passes:          u64,
    /// Passes since the last report.
    pub interval_passes: u64,
    /// Per-partition task times since the last report.
    pub partition:       TimingStats,
    /// Boundary pass times since the last report.
    pub boundary:        TimingStats,
    /// Whole-pass wall times since the last report.
    pub pass:            TimingStats,
}

impl KindStats {
    pub fn reset_interval(&mut self) {
        self.interval_passes = 0;
        self.partition.reset();
        self.boundary.reset();
        self.pass.reset();
    }
}

/// One line of a timing report.
#[derive(Clone, Debug, PartialEq)]
pub struct TimingSummary {
    pub kind:        AgentKind,
    pub passes:      u64,
    pub min_ms:      f64,
    pub max_ms:      f64,
    pub mean_ms:     f64,
    pub boundary_ms: f64,
}

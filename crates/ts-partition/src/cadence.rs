//! Adaptive re-partitioning cadence.
//!
//! The global scheduler calls [`AdaptiveCadence::check`] every
//! `refresh_interval` ticks.  Under heavy load (network load at or above the
//! threshold) every check re-partitions.  Under light load checks are skipped
//! and the age of the current assignment grows by one interval per skipped
//! check, until it exceeds `max_refresh_interval` and a refresh is forced.
//!
//! ```text
//! age ≤ max:  load ≥ threshold → refresh, age = interval
//!             otherwise        → keep,    age += interval
//! age > max:                   → refresh, age = interval
//! ```

use ts_core::PartitionConfig;

/// Why a refresh was triggered.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RefreshReason {
    LoadThreshold,
    MaxIntervalReached,
}

/// Outcome of one cadence check.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RefreshDecision {
    Keep,
    Refresh(RefreshReason),
}

#[derive(Clone, Debug)]
pub struct AdaptiveCadence {
    refresh_interval:     u64,
    max_refresh_interval: u64,
    load_threshold:       usize,
    /// Ticks the current assignment has been (nominally) in use.
    age:                  u64,
}

impl AdaptiveCadence {
    pub fn new(config: &PartitionConfig) -> Self {
        Self {
            refresh_interval:     config.refresh_interval,
            max_refresh_interval: config.max_refresh_interval,
            load_threshold:       config.load_threshold,
            age:                  config.refresh_interval,
        }
    }

    #[inline]
    pub fn refresh_interval(&self) -> u64 {
        self.refresh_interval
    }

    #[inline]
    pub fn age(&self) -> u64 {
        self.age
    }

    /// Decide whether the assignment should be recomputed now.
    ///
    /// A `Refresh` decision resets the age; the caller is expected to
    /// re-partition immediately.
    pub fn check(&mut self, load: usize) -> RefreshDecision {
        let decision = if self.age > self.max_refresh_interval {
            RefreshDecision::Refresh(RefreshReason::MaxIntervalReached)
        } else if load >= self.load_threshold {
            RefreshDecision::Refresh(RefreshReason::LoadThreshold)
        } else {
            RefreshDecision::Keep
        };

        match decision {
            RefreshDecision::Keep => self.age += self.refresh_interval,
            RefreshDecision::Refresh(_) => self.age = self.refresh_interval,
        }
        decision
    }
}

//! Priorities and registration parameters.

use std::fmt;

use ts_core::Tick;

use crate::{ScheduleError, ScheduleResult};

/// Tie-breaker between activities due on the same tick.  Lower runs first.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Priority(i32);

impl Priority {
    /// Runs before every other activity of a tick.
    pub const FIRST: Priority = Priority(i32::MIN);
    /// Runs after every other activity of a tick.
    pub const LAST: Priority = Priority(i32::MAX);

    /// A user priority.  The bracket values are reserved.
    pub fn new(value: i32) -> ScheduleResult<Self> {
        if value == i32::MIN || value == i32::MAX {
            return Err(ScheduleError::ReservedPriority(value));
        }
        Ok(Priority(value))
    }

    #[inline]
    pub fn value(self) -> i32 {
        self.0
    }

    #[inline]
    pub fn is_reserved(self) -> bool {
        self == Self::FIRST || self == Self::LAST
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::FIRST => f.write_str("FIRST"),
            Self::LAST  => f.write_str("LAST"),
            Priority(p) => write!(f, "{p}"),
        }
    }
}

/// When and how often an activity fires.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ScheduleParams {
    pub start:    Tick,
    /// `None` fires once at `start`.
    pub interval: Option<u64>,
    pub priority: Priority,
}

impl ScheduleParams {
    /// Fire at `start`, `start + interval`, `start + 2·interval`, ...
    pub fn repeating(start: Tick, interval: u64, priority: Priority) -> Self {
        Self { start, interval: Some(interval), priority }
    }

    /// Fire exactly once, at `at`.
    pub fn once(at: Tick, priority: Priority) -> Self {
        Self { start: at, interval: None, priority }
    }
}

//! `Schedule<A>`: sparse per-tick activity queue.
//!
//! # Why a map of ticks
//!
//! Most activities fire far less often than every tick (zone stepping,
//! partition refresh, metrics).  Keeping a `BTreeMap<Tick, Vec<Entry>>`
//! means a tick only touches what is due on it, and a repeating activity is
//! re-armed at its next grid tick as it is drained.

use std::collections::BTreeMap;
use std::fmt;

use ts_core::Tick;

use crate::{Priority, ScheduleError, ScheduleParams, ScheduleResult};

/// Identifies one registration, for cancellation.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ActivityHandle(pub u64);

impl fmt::Display for ActivityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug)]
struct Entry<A> {
    handle:   ActivityHandle,
    priority: Priority,
    interval: Option<u64>,
    action:   A,
}

/// A discrete-event schedule of actions of type `A`.
///
/// Ticks must be drained in increasing order; each tick can be drained once.
#[derive(Clone, Debug)]
pub struct Schedule<A> {
    queue:       BTreeMap<Tick, Vec<Entry<A>>>,
    at_end:      Vec<(Priority, ActivityHandle, A)>,
    next_handle: u64,
    /// First tick not yet drained.
    now:         Tick,
    /// Cached entry count for O(1) `len()`.
    total:       usize,
}

impl<A> Default for Schedule<A> {
    fn default() -> Self {
        Self {
            queue:       BTreeMap::new(),
            at_end:      Vec::new(),
            next_handle: 0,
            now:         Tick::ZERO,
            total:       0,
        }
    }
}

impl<A: Clone> Schedule<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `action` with the given parameters.
    ///
    /// A start before the next drainable tick rolls forward onto the
    /// activity's interval grid (a one-shot fires on the next drain).
    pub fn schedule(&mut self, params: ScheduleParams, action: A) -> ScheduleResult<ActivityHandle> {
        if params.interval == Some(0) {
            return Err(ScheduleError::ZeroInterval);
        }
        let first = match params.interval {
            _ if params.start >= self.now => params.start,
            None => self.now,
            Some(interval) => next_on_grid(params.start, interval, self.now),
        };
        let handle = self.fresh_handle();
        self.push(first, Entry { handle, priority: params.priority, interval: params.interval, action });
        Ok(handle)
    }

    /// Register `action` to run once after the final tick.
    pub fn schedule_at_end(&mut self, action: A, priority: Priority) -> ActivityHandle {
        let handle = self.fresh_handle();
        self.at_end.push((priority, handle, action));
        handle
    }

    /// Remove a registration (tick or end action).
    pub fn cancel(&mut self, handle: ActivityHandle) -> ScheduleResult<()> {
        let before = self.at_end.len();
        self.at_end.retain(|(_, h, _)| *h != handle);
        if self.at_end.len() != before {
            return Ok(());
        }

        let mut found = None;
        for (tick, entries) in self.queue.iter_mut() {
            if let Some(pos) = entries.iter().position(|e| e.handle == handle) {
                entries.remove(pos);
                found = Some(*tick);
                break;
            }
        }
        match found {
            None => Err(ScheduleError::UnknownActivity(handle)),
            Some(tick) => {
                self.total -= 1;
                if self.queue.get(&tick).is_some_and(Vec::is_empty) {
                    self.queue.remove(&tick);
                }
                Ok(())
            }
        }
    }

    /// Remove and return every action due at `tick`, in (priority,
    /// registration) order.  Repeating activities are re-armed.
    ///
    /// Entries left behind at earlier, never-drained ticks are included, so
    /// skipping ticks never loses an activity.
    pub fn drain_tick(&mut self, tick: Tick) -> ScheduleResult<Vec<A>> {
        if tick < self.now {
            return Err(ScheduleError::TickAlreadyDrained { tick, next: self.now });
        }
        let later = self.queue.split_off(&tick.next());
        let due = std::mem::replace(&mut self.queue, later);
        self.now = tick.next();

        let mut fired: Vec<(Tick, Entry<A>)> = Vec::new();
        for (at, entries) in due {
            fired.extend(entries.into_iter().map(|e| (at, e)));
        }
        self.total -= fired.len();
        fired.sort_by_key(|(_, e)| (e.priority, e.handle));

        let mut actions = Vec::with_capacity(fired.len());
        for (at, entry) in fired {
            if let Some(interval) = entry.interval {
                let next = next_on_grid(at, interval, self.now);
                actions.push(entry.action.clone());
                self.push(next, entry);
            } else {
                actions.push(entry.action);
            }
        }
        Ok(actions)
    }

    /// Remove and return the end actions in (priority, registration) order.
    pub fn drain_end(&mut self) -> Vec<A> {
        let mut end = std::mem::take(&mut self.at_end);
        end.sort_by_key(|(p, h, _)| (*p, *h));
        end.into_iter().map(|(_, _, a)| a).collect()
    }

    /// The earliest tick with at least one queued activity.
    pub fn next_tick(&self) -> Option<Tick> {
        self.queue.keys().next().copied()
    }

    /// Queued tick activities (end actions excluded).
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    fn fresh_handle(&mut self) -> ActivityHandle {
        let h = ActivityHandle(self.next_handle);
        self.next_handle += 1;
        h
    }

    fn push(&mut self, tick: Tick, entry: Entry<A>) {
        self.queue.entry(tick).or_default().push(entry);
        self.total += 1;
    }
}

/// The first tick `≥ floor` on the grid `start + k·interval`.
fn next_on_grid(start: Tick, interval: u64, floor: Tick) -> Tick {
    if start >= floor {
        return start;
    }
    let behind = floor.0 - start.0;
    Tick(start.0 + behind.div_ceil(interval) * interval)
}

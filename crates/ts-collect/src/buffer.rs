//! `SnapshotBuffer`: sealed snapshots ordered by tick, plus the consumer
//! cursor registry that decides how much of it must be retained.
//!
//! # Retention
//!
//! The retention floor is the smallest registered cursor.  With no consumers
//! it is `current_tick - 1`.  A consumer registered without a cursor (not
//! started yet) pins the whole buffer until it starts.  Everything strictly
//! below the floor is evicted by [`SnapshotBuffer::cleanup`]; consumers that
//! fall behind the floor silently miss those ticks.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ts_core::{ConsumerId, Tick};

use crate::{CollectError, CollectResult, TickSnapshot};

/// Answer to "what is the next tick at or after `from`?".
#[derive(Clone, Debug)]
pub enum NextTick {
    /// The first sealed snapshot with index ≥ `from`.
    Ready(Arc<TickSnapshot>),
    /// `from` has been sealed but nothing at or after it was stored.
    Placeholder(TickSnapshot),
    /// `from` is beyond the last sealed tick; retry later.
    NotReady,
}

impl NextTick {
    /// Tick of the returned snapshot, if any.
    pub fn tick(&self) -> Option<Tick> {
        match self {
            NextTick::Ready(s)       => Some(s.tick()),
            NextTick::Placeholder(s) => Some(s.tick()),
            NextTick::NotReady       => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        !matches!(self, NextTick::NotReady)
    }
}

/// Result of one janitor sweep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sweep {
    /// `None` when nothing may be evicted (an unstarted consumer).
    pub floor:     Option<Tick>,
    pub removed:   usize,
    pub remaining: usize,
}

#[derive(Default)]
struct Slots {
    snapshots:   BTreeMap<Tick, Arc<TickSnapshot>>,
    last_sealed: Option<Tick>,
}

#[derive(Default)]
struct Registry {
    cursors: BTreeMap<ConsumerId, Option<Tick>>,
    next_id: u32,
}

/// Single-writer, multi-reader store of sealed snapshots.
#[derive(Default)]
pub struct SnapshotBuffer {
    slots:        RwLock<Slots>,
    registry:     Mutex<Registry>,
    current_tick: AtomicU64,
    closed:       AtomicBool,
}

// Compile-time assertion: the buffer is shared across threads.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<SnapshotBuffer>();
};

impl SnapshotBuffer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn read(&self) -> RwLockReadGuard<'_, Slots> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Slots> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Writer side (sim thread via DataCollector) ────────────────────────

    /// Append a sealed, non-empty snapshot.
    pub(crate) fn publish(&self, snapshot: TickSnapshot) -> CollectResult<Arc<TickSnapshot>> {
        let tick = snapshot.tick();
        let mut slots = self.write();
        if let Some(last) = slots.last_sealed.filter(|last| *last >= tick) {
            return Err(CollectError::TickOutOfOrder { tick, last });
        }
        let arc = Arc::new(snapshot);
        slots.snapshots.insert(tick, Arc::clone(&arc));
        slots.last_sealed = Some(tick);
        Ok(arc)
    }

    /// Record that `tick` was sealed without storing anything (empty tick).
    pub(crate) fn mark_sealed(&self, tick: Tick) -> CollectResult<()> {
        let mut slots = self.write();
        if let Some(last) = slots.last_sealed.filter(|last| *last >= tick) {
            return Err(CollectError::TickOutOfOrder { tick, last });
        }
        slots.last_sealed = Some(tick);
        Ok(())
    }

    pub fn set_current_tick(&self, tick: Tick) {
        self.current_tick.store(tick.0, Ordering::Release);
    }

    pub fn current_tick(&self) -> Tick {
        Tick(self.current_tick.load(Ordering::Acquire))
    }

    /// No more snapshots will be sealed.  Consumers drain and exit.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    // ── Reader side ───────────────────────────────────────────────────────

    pub fn next_tick(&self, from: Tick) -> NextTick {
        let slots = self.read();
        match slots.last_sealed {
            Some(last) if from <= last => match slots.snapshots.range(from..=last).next() {
                Some((_, snap)) => NextTick::Ready(Arc::clone(snap)),
                None => NextTick::Placeholder(TickSnapshot::new(from)),
            },
            _ => NextTick::NotReady,
        }
    }

    /// The snapshot stored at exactly `tick`.
    pub fn get(&self, tick: Tick) -> Option<Arc<TickSnapshot>> {
        self.read().snapshots.get(&tick).cloned()
    }

    pub fn first_available(&self) -> Option<Tick> {
        self.read().snapshots.keys().next().copied()
    }

    pub fn last_sealed(&self) -> Option<Tick> {
        self.read().last_sealed
    }

    pub fn len(&self) -> usize {
        self.read().snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().snapshots.is_empty()
    }

    /// Highest cursor value a consumer may hold: last sealed + 1.
    fn cursor_cap(&self) -> Tick {
        self.last_sealed().map_or(Tick::ZERO, Tick::next)
    }

    // ── Consumer registry ─────────────────────────────────────────────────

    /// Register a consumer.  `start = None` registers it as not yet started.
    pub fn register_consumer(self: &Arc<Self>, start: Option<Tick>) -> ConsumerCursor {
        let start = start.map(|t| t.min(self.cursor_cap()));
        let mut reg = self.registry();
        let id = ConsumerId(reg.next_id);
        reg.next_id += 1;
        reg.cursors.insert(id, start);
        ConsumerCursor { id, buffer: Arc::clone(self) }
    }

    /// Remove a consumer's cursor.  Returns `false` if it was not registered.
    pub fn deregister(&self, id: ConsumerId) -> bool {
        self.registry().cursors.remove(&id).is_some()
    }

    pub fn consumer_count(&self) -> usize {
        self.registry().cursors.len()
    }

    /// Cursor of a registered consumer (`Some(None)` = not started).
    pub fn cursor(&self, id: ConsumerId) -> Option<Option<Tick>> {
        self.registry().cursors.get(&id).copied()
    }

    /// Move a cursor, clamped to last sealed + 1.  Returns the stored value.
    fn set_cursor(&self, id: ConsumerId, to: Tick) -> Tick {
        let to = to.min(self.cursor_cap());
        if let Some(slot) = self.registry().cursors.get_mut(&id) {
            *slot = Some(to);
        }
        to
    }

    // ── Janitor ───────────────────────────────────────────────────────────

    /// The oldest tick that must be kept, or `None` if nothing may go.
    pub fn retention_floor(&self) -> Option<Tick> {
        let reg = self.registry();
        if reg.cursors.is_empty() {
            return self.current_tick().prev();
        }
        let mut floor: Option<Tick> = None;
        for cursor in reg.cursors.values() {
            let c = (*cursor)?;
            floor = Some(floor.map_or(c, |f| f.min(c)));
        }
        floor
    }

    /// Evict every snapshot strictly below the retention floor.
    pub fn cleanup(&self) -> Sweep {
        let floor = self.retention_floor();
        let mut slots = self.write();
        let removed = match floor {
            Some(floor) => {
                let keep = slots.snapshots.split_off(&floor);
                let removed = slots.snapshots.len();
                slots.snapshots = keep;
                removed
            }
            None => 0,
        };
        Sweep { floor, removed, remaining: slots.snapshots.len() }
    }
}

// ── ConsumerCursor ────────────────────────────────────────────────────────────

/// A registered consumer's read position.  Deregisters on drop.
pub struct ConsumerCursor {
    id:     ConsumerId,
    buffer: Arc<SnapshotBuffer>,
}

impl ConsumerCursor {
    #[inline]
    pub fn id(&self) -> ConsumerId {
        self.id
    }

    pub fn buffer(&self) -> &Arc<SnapshotBuffer> {
        &self.buffer
    }

    /// Next unread tick, or `None` before the consumer has started.
    pub fn position(&self) -> Option<Tick> {
        self.buffer.cursor(self.id).flatten()
    }

    /// Move the cursor (start, advance, or reset).  Clamped to last sealed + 1.
    pub fn advance_to(&self, tick: Tick) -> Tick {
        self.buffer.set_cursor(self.id, tick)
    }

    /// `next_tick` from the current position; `NotReady` before start.
    pub fn peek(&self) -> NextTick {
        match self.position() {
            Some(from) => self.buffer.next_tick(from),
            None => NextTick::NotReady,
        }
    }
}

impl Drop for ConsumerCursor {
    fn drop(&mut self) {
        self.buffer.deregister(self.id);
    }
}

//! `DataCollector`: the simulation thread's write handle on the buffer.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use ts_core::{Fact, FactKind, FactSink, Tick};

use crate::{CollectError, CollectResult, SnapshotBuffer, TickSnapshot};

/// Lifecycle of a [`DataCollector`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CollectionState {
    Idle,
    Collecting,
    /// Records are dropped; ticks are still sealed (empty).
    Paused,
    Stopped,
}

/// Owns the single open snapshot and seals it into the shared buffer.
///
/// Only one tick may be open at a time and ticks must be opened in strictly
/// increasing order.  An empty snapshot is not stored; its tick is still
/// marked sealed so consumers see a placeholder for it.
pub struct DataCollector {
    buffer:      Arc<SnapshotBuffer>,
    state:       CollectionState,
    open:        Option<TickSnapshot>,
    last_opened: Option<Tick>,
    sealed:      u64,
}

impl DataCollector {
    pub fn new(buffer: Arc<SnapshotBuffer>) -> Self {
        Self { buffer, state: CollectionState::Idle, open: None, last_opened: None, sealed: 0 }
    }

    pub fn buffer(&self) -> &Arc<SnapshotBuffer> {
        &self.buffer
    }

    pub fn state(&self) -> CollectionState {
        self.state
    }

    /// Number of ticks sealed so far (including empty ones).
    pub fn sealed_count(&self) -> u64 {
        self.sealed
    }

    pub fn open_tick(&self) -> Option<Tick> {
        self.open.as_ref().map(TickSnapshot::tick)
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────

    pub fn start(&mut self) -> CollectResult<()> {
        match self.state {
            CollectionState::Stopped => Err(CollectError::Stopped),
            _ => {
                self.state = CollectionState::Collecting;
                info!("data collection started");
                Ok(())
            }
        }
    }

    pub fn pause(&mut self) {
        if self.state == CollectionState::Collecting {
            self.state = CollectionState::Paused;
            debug!("data collection paused");
        }
    }

    pub fn resume(&mut self) {
        if self.state == CollectionState::Paused {
            self.state = CollectionState::Collecting;
            debug!("data collection resumed");
        }
    }

    /// Seal any open snapshot and close the buffer.  Idempotent.
    pub fn stop(&mut self) -> CollectResult<()> {
        if self.state == CollectionState::Stopped {
            return Ok(());
        }
        if self.open.is_some() {
            self.seal()?;
        }
        self.state = CollectionState::Stopped;
        self.buffer.close();
        info!(sealed = self.sealed, "data collection stopped");
        Ok(())
    }

    // ── Per tick ──────────────────────────────────────────────────────────

    /// Publish the simulation's current tick (used by the retention floor).
    pub fn set_current_tick(&self, tick: Tick) {
        self.buffer.set_current_tick(tick);
    }

    pub fn open(&mut self, tick: Tick) -> CollectResult<()> {
        if self.state == CollectionState::Stopped {
            return Err(CollectError::Stopped);
        }
        if let Some(open) = &self.open {
            return Err(CollectError::SnapshotAlreadyOpen { open: open.tick(), requested: tick });
        }
        if let Some(last) = self.last_opened.filter(|last| *last >= tick) {
            return Err(CollectError::TickOutOfOrder { tick, last });
        }
        self.last_opened = Some(tick);
        self.open = Some(TickSnapshot::new(tick));
        Ok(())
    }

    fn accepting(&mut self) -> CollectResult<Option<&mut TickSnapshot>> {
        let collecting = self.state == CollectionState::Collecting;
        match self.open.as_mut() {
            Some(snap) => Ok(collecting.then_some(snap)),
            None => Err(CollectError::NoOpenSnapshot),
        }
    }

    pub fn record(&mut self, kind: FactKind, id: u64, data: Value) -> CollectResult<()> {
        if let Some(snap) = self.accepting()? {
            snap.record(Fact { kind, id, data });
        }
        Ok(())
    }

    /// Move every fact in `sink` into the open snapshot.  The sink is drained
    /// even while paused.
    pub fn absorb(&mut self, sink: &mut FactSink) -> CollectResult<()> {
        match self.accepting()? {
            Some(snap) => snap.absorb(sink),
            None => {
                sink.drain().for_each(drop);
            }
        }
        Ok(())
    }

    /// Close the open tick.  Returns the stored snapshot, or `None` if the
    /// tick was empty.
    pub fn seal(&mut self) -> CollectResult<Option<Arc<TickSnapshot>>> {
        let snap = self.open.take().ok_or(CollectError::NoOpenSnapshot)?;
        self.sealed += 1;
        if snap.is_empty() {
            self.buffer.mark_sealed(snap.tick())?;
            Ok(None)
        } else {
            self.buffer.publish(snap).map(Some)
        }
    }
}

//! `SimContext`: every piece of run state except the world model.

use std::sync::Arc;

use ts_collect::{ConsumerHandle, DataCollector, Janitor, SnapshotBuffer};
use ts_core::{AgentKind, FactSink, SimClock, SimConfig, Tick};
use ts_partition::{AdaptiveCadence, PartitionAssignment, Partitioner, PopulationView};
use ts_schedule::Schedule;
use ts_step::SteppingScheduler;
use ts_sync::SyncController;

use crate::{Activity, World};

/// The explicit context object of one simulation run.
///
/// Created by [`SimBuilder`][crate::SimBuilder] and owned by the
/// [`Sim`][crate::Sim]; nothing here is process-global, so any number of
/// runs can coexist in one process.
pub struct SimContext {
    pub config:      SimConfig,
    pub clock:       SimClock,
    pub schedule:    Schedule<Activity>,

    pub partitioner: Box<dyn Partitioner>,
    pub assignment:  PartitionAssignment,
    pub cadence:     AdaptiveCadence,
    /// `None` once the pool has been shut down.
    pub stepper:     Option<SteppingScheduler>,

    /// Facts of the current tick, moved into the open snapshot at tick stop.
    pub facts:       FactSink,
    pub collector:   DataCollector,
    pub janitor:     Option<Janitor>,
    pub consumers:   Vec<ConsumerHandle>,

    pub sync:        Option<SyncController>,
}

impl SimContext {
    pub fn buffer(&self) -> &Arc<SnapshotBuffer> {
        self.collector.buffer()
    }

    #[inline]
    pub fn collecting(&self) -> bool {
        self.config.collect.enabled
    }
}

/// What the partition provider sees of `world` at `tick`.
pub fn population_view<W: World + ?Sized>(world: &W, tick: Tick) -> PopulationView {
    PopulationView {
        tick,
        counts:         AgentKind::ALL.map(|kind| world.count(kind)),
        boundary_hints: AgentKind::ALL.map(|kind| world.boundary_hints(kind)),
        load:           world.load(),
    }
}

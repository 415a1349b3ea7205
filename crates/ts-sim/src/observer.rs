//! Simulation observer trait for progress reporting.

use ts_core::Tick;
use ts_step::StepReport;

/// What happened during one tick.
#[derive(Clone, Debug, Default)]
pub struct TickReport {
    pub tick:       Tick,
    /// Activities fired, in execution order.
    pub activities: usize,
    /// One report per stepping pass run this tick.
    pub steps:      Vec<StepReport>,
    /// Facts recorded during the tick.
    pub facts:      usize,
    /// Whether a non-empty snapshot was stored for the tick.
    pub stored:     bool,
}

/// Callbacks invoked by [`Sim::run`][crate::Sim::run] at tick boundaries.
///
/// All methods have default no-op implementations so implementors only need to
/// override what they care about.
pub trait SimObserver {
    /// Called at the very start of each tick, after the gate has granted it.
    fn on_tick_start(&mut self, _tick: Tick) {}

    /// Called after the tick's snapshot is sealed.
    fn on_tick_end(&mut self, _report: &TickReport) {}

    /// Called once after the end-of-run actions completed.
    fn on_sim_end(&mut self, _final_tick: Tick) {}
}

/// A [`SimObserver`] that does nothing.
pub struct NoopObserver;

impl SimObserver for NoopObserver {}

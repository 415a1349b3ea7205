//! The `Sim` struct and its tick loop.

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use ts_collect::SnapshotBuffer;
use ts_core::{StepFailure, Tick};
use ts_partition::{PartitionAssignment, RefreshDecision};
use ts_step::SteppingScheduler;
use ts_sync::{AwaitOutcome, ControlHandler, ControlReply, SyncGate};

use crate::activity::{Activity, EndAction};
use crate::context::population_view;
use crate::{SimContext, SimError, SimObserver, SimResult, TickReport, World};

/// The main simulation runner.
///
/// `Sim<W>` drives the global schedule tick by tick.  Each tick:
///
/// 1. **Gate** (synchronized mode only): block until the controller grants
///    the tick, serving control requests meanwhile.
/// 2. **Activities**: drain the tick's activities from the schedule and run
///    them in priority order (see the crate docs for the table).
/// 3. **Advance** the clock.
///
/// The first error ends the run: outputs are flushed and closed, the pool is
/// shut down, the controller receives `CTRL_end` with `CODE:"KO"`, and the
/// error is returned.
///
/// Create via [`SimBuilder`][crate::SimBuilder].
pub struct Sim<W: World> {
    /// Everything but the world model.
    pub ctx: SimContext,

    /// The external traffic model.
    pub world: W,

    started:  bool,
    finished: bool,
}

impl<W: World> Sim<W> {
    pub(crate) fn from_parts(ctx: SimContext, world: W) -> Self {
        Self { ctx, world, started: false, finished: false }
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    /// The next tick to run.
    #[inline]
    pub fn current_tick(&self) -> Tick {
        self.ctx.clock.current_tick
    }

    pub fn assignment(&self) -> &PartitionAssignment {
        &self.ctx.assignment
    }

    /// `None` after the run has finished.
    pub fn stepper(&self) -> Option<&SteppingScheduler> {
        self.ctx.stepper.as_ref()
    }

    pub fn buffer(&self) -> &Arc<SnapshotBuffer> {
        self.ctx.buffer()
    }

    /// Control-plane address when synchronized mode is enabled.
    pub fn sync_addr(&self) -> Option<SocketAddr> {
        self.ctx.sync.as_ref().map(|s| s.local_addr())
    }

    pub fn gate(&self) -> Option<&Arc<SyncGate>> {
        self.ctx.sync.as_ref().map(|s| s.gate())
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Run from the current tick to `config.end_tick()` (or until the
    /// controller sends `CTRL_end`), then run the end-of-run actions.
    pub fn run<O: SimObserver>(&mut self, observer: &mut O) -> SimResult<()> {
        let result = self.start().and_then(|()| self.tick_loop(None, observer));
        self.conclude(result, observer)
    }

    /// Run exactly `n` ticks from the current position (ignores `end_tick`).
    ///
    /// The run stays open; call [`finish`](Self::finish) when done.  A failing
    /// tick ends the run as in [`run`](Self::run).
    pub fn run_ticks<O: SimObserver>(&mut self, n: u64, observer: &mut O) -> SimResult<()> {
        match self.start().and_then(|()| self.tick_loop(Some(n), observer)) {
            Ok(()) => Ok(()),
            Err(e) => self.conclude(Err(e), observer),
        }
    }

    /// Run the end-of-run actions: stop collection, join consumers, shut
    /// down the pool, and send `CTRL_end`.  Idempotent.
    pub fn finish(&mut self) -> SimResult<()> {
        self.end_run(true)
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────

    fn start(&mut self) -> SimResult<()> {
        if self.finished {
            return Err(SimError::Finished);
        }
        if self.started {
            return Ok(());
        }
        self.started = true;
        if self.ctx.collecting() {
            self.ctx.collector.start()?;
        }
        if let Some(sync) = &self.ctx.sync {
            sync.announce_ready();
        }
        info!(
            end = %self.ctx.config.end_tick(),
            partitions = self.ctx.config.partition.partitions,
            multi_threading = self.ctx.config.multi_threading,
            synchronized = self.ctx.sync.is_some(),
            "simulation started"
        );
        Ok(())
    }

    fn tick_loop<O: SimObserver>(&mut self, limit: Option<u64>, observer: &mut O) -> SimResult<()> {
        let end = self.ctx.config.end_tick();
        let mut done = 0;
        loop {
            let now = self.current_tick();
            let reached = match limit {
                Some(n) => done >= n,
                None => now >= end,
            };
            if reached {
                return Ok(());
            }
            if !self.process_tick(now, observer)? {
                info!(tick = %now, "run ended by controller");
                return Ok(());
            }
            done += 1;
        }
    }

    fn conclude<O: SimObserver>(&mut self, result: SimResult<()>, observer: &mut O) -> SimResult<()> {
        match result {
            Ok(()) => {
                self.end_run(true)?;
                observer.on_sim_end(self.current_tick());
                Ok(())
            }
            Err(e) => {
                error!(tick = %self.current_tick(), error = %e, "simulation failed; closing outputs");
                if let Err(close) = self.end_run(false) {
                    warn!(error = %close, "error while closing after failure");
                }
                Err(e)
            }
        }
    }

    fn end_run(&mut self, ok: bool) -> SimResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        let mut first_err = None;
        for activity in self.ctx.schedule.drain_end() {
            if let Activity::End(action) = activity {
                if let Err(e) = self.run_end_action(action, ok) {
                    first_err.get_or_insert(e);
                }
            }
        }
        info!(tick = %self.current_tick(), ok, "simulation finished");
        first_err.map_or(Ok(()), Err)
    }

    fn run_end_action(&mut self, action: EndAction, ok: bool) -> SimResult<()> {
        let ctx = &mut self.ctx;
        match action {
            EndAction::StopCollection => ctx.collector.stop()?,
            EndAction::CloseConsumers => {
                let mut first_err = None;
                for handle in ctx.consumers.drain(..) {
                    match handle.join() {
                        Ok(summary) => info!(
                            consumer = %summary.name,
                            consumed = summary.consumed,
                            placeholders = summary.placeholders,
                            "consumer closed"
                        ),
                        Err(e) => {
                            first_err.get_or_insert(e);
                        }
                    }
                }
                if let Some(janitor) = ctx.janitor.take() {
                    let removed = janitor.stop();
                    debug!(removed, "janitor stopped");
                }
                if let Some(e) = first_err {
                    return Err(e.into());
                }
            }
            EndAction::ShutdownPool => {
                if let Some(stepper) = ctx.stepper.take() {
                    stepper.shutdown();
                }
            }
            EndAction::EndControl => {
                if let Some(sync) = ctx.sync.as_mut() {
                    sync.finish(ok);
                }
            }
        }
        Ok(())
    }

    // ── Core tick processing ──────────────────────────────────────────────

    /// Run one tick.  `false` when the controller ended the run instead.
    fn process_tick<O: SimObserver>(&mut self, now: Tick, observer: &mut O) -> SimResult<bool> {
        if let Some(sync) = self.ctx.sync.as_mut() {
            let mut handler = WorldControl(&mut self.world);
            if sync.await_tick(now, &mut handler)? == AwaitOutcome::EndRequested {
                return Ok(false);
            }
        }

        observer.on_tick_start(now);
        let activities = self.ctx.schedule.drain_tick(now)?;
        let mut report = TickReport { tick: now, activities: activities.len(), ..TickReport::default() };
        for activity in activities {
            self.execute(activity, now, &mut report)?;
        }
        observer.on_tick_end(&report);

        self.ctx.clock.advance();
        Ok(true)
    }

    fn execute(&mut self, activity: Activity, now: Tick, report: &mut TickReport) -> SimResult<()> {
        let name = activity.name();
        let world_err = |source: StepFailure| SimError::World { activity: name, tick: now, source };
        let ctx = &mut self.ctx;
        match activity {
            Activity::TickStart => {
                ctx.collector.set_current_tick(now);
                if ctx.collecting() {
                    ctx.collector.open(now)?;
                }
            }
            Activity::HandleEvents => self.world.handle_events(now, &mut ctx.facts).map_err(world_err)?,
            Activity::LoadDemand => self.world.load_demand(now, &mut ctx.facts).map_err(world_err)?,
            Activity::RefreshSpeeds => self.world.refresh_speeds(now).map_err(world_err)?,
            Activity::Step(kind) => {
                let stepper = ctx.stepper.as_mut().ok_or(SimError::Finished)?;
                let agents = self.world.agents_mut(kind);
                let step = if ctx.config.multi_threading {
                    stepper.step_all(kind, now, agents, ctx.assignment.get(kind), &mut ctx.facts)?
                } else {
                    stepper.step_sequential(kind, now, agents, &mut ctx.facts)?
                };
                report.steps.push(step);
            }
            Activity::DisplayMetrics => {
                let (day, hour, minute) = ctx.clock.elapsed_dhm();
                let unix = ctx.clock.current_unix_secs();
                let buffered = ctx.buffer().len();
                let epoch = ctx.assignment.epoch();
                match self.world.metrics(now) {
                    Some(metrics) => {
                        info!(tick = %now, unix, day, hour, minute, buffered, epoch, %metrics, "progress")
                    }
                    None => info!(tick = %now, unix, day, hour, minute, buffered, epoch, "progress"),
                }
            }
            Activity::ReportTiming => {
                if let Some(stepper) = ctx.stepper.as_mut() {
                    stepper.report_time(now);
                }
            }
            Activity::Repartition => self.repartition(now),
            Activity::TickStop => {
                report.facts = ctx.facts.len();
                if ctx.collecting() {
                    ctx.collector.absorb(&mut ctx.facts)?;
                    report.stored = ctx.collector.seal()?.is_some();
                    debug!(tick = %now, facts = report.facts, stored = report.stored, "tick sealed");
                } else {
                    ctx.facts.drain().for_each(drop);
                }
            }
            Activity::End(_) => {}
        }
        Ok(())
    }

    /// Ask the cadence whether to re-partition, and do so if told.
    ///
    /// A provider failure keeps the current assignment; the run continues.
    fn repartition(&mut self, now: Tick) {
        let ctx = &mut self.ctx;
        let reason = match ctx.cadence.check(self.world.load()) {
            RefreshDecision::Keep => {
                debug!(tick = %now, age = ctx.cadence.age(), "partition kept");
                return;
            }
            RefreshDecision::Refresh(reason) => reason,
        };

        let view = population_view(&self.world, now);
        let fresh = ctx
            .partitioner
            .partition(&view, ctx.config.partition.partitions)
            .and_then(|next| next.validate(view.counts).map(|()| next));
        match fresh {
            Ok(mut next) => {
                next.set_epoch(ctx.assignment.epoch() + 1);
                ctx.assignment = next;
                info!(
                    tick = %now,
                    epoch = ctx.assignment.epoch(),
                    ?reason,
                    partitioner = ctx.partitioner.name(),
                    "partition refreshed"
                );
            }
            Err(e) => warn!(tick = %now, error = %e, "partition refresh failed; keeping current assignment"),
        }
    }
}

// ── Control adapter ───────────────────────────────────────────────────────────

/// Forwards controller commands to the world model on the simulation thread.
struct WorldControl<'a, W: World>(&'a mut W);

impl<W: World> ControlHandler for WorldControl<'_, W> {
    fn control(&mut self, op: &str, body: &Value) -> ControlReply {
        self.0.control(op, body)
    }

    fn query(&mut self, what: &str, body: &Value) -> Result<Value, String> {
        self.0.query(what, body)
    }
}

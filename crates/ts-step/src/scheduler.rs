//! The `SteppingScheduler` and its fan-out / fan-in pass.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, error, info};

use ts_core::{AgentKind, FactSink, PartitionId, StepContext, Steppable, Tick};
use ts_partition::KindAssignment;

use crate::{KindStats, StepError, StepResult, TimingStats, TimingSummary};

// ── Reports ───────────────────────────────────────────────────────────────────

/// Timing of one partition task.
#[derive(Clone, Debug, PartialEq)]
pub struct PartitionTiming {
    pub partition: PartitionId,
    pub agents:    usize,
    pub elapsed:   Duration,
}

/// Result of one completed stepping pass.
#[derive(Clone, Debug)]
pub struct StepReport {
    pub kind:             AgentKind,
    pub tick:             Tick,
    pub partitions:       Vec<PartitionTiming>,
    pub boundary_agents:  usize,
    pub boundary_elapsed: Duration,
    /// Min / max / mean over this pass's partition task times.
    pub timing:           TimingStats,
    /// Facts produced by the pass (partitions and boundary).
    pub facts:            usize,
}

impl StepReport {
    pub fn agents(&self) -> usize {
        self.partitions.iter().map(|p| p.agents).sum::<usize>() + self.boundary_agents
    }
}

/// What a partition task hands back to the join.
struct PartitionOutcome {
    timing:  PartitionTiming,
    facts:   FactSink,
    failure: Option<StepError>,
}

type Bucket<'a, A> = Vec<(usize, &'a mut A)>;

// ── SteppingScheduler ─────────────────────────────────────────────────────────

/// Runs stepping passes on a fixed-size worker pool.
///
/// The pool is built once, reused for every pass of every tick, and torn
/// down by [`shutdown`](Self::shutdown) at the end of the run.
pub struct SteppingScheduler {
    pool:    ThreadPool,
    workers: usize,
    stats:   [KindStats; AgentKind::COUNT],
}

impl SteppingScheduler {
    /// Build a pool with `workers` threads (normally the partition count).
    pub fn new(workers: usize) -> StepResult<Self> {
        if workers == 0 {
            return Err(StepError::ZeroWorkers);
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("ts-step-{i}"))
            .build()?;
        info!(workers, "stepping pool started");
        Ok(Self { pool, workers, stats: Default::default() })
    }

    #[inline]
    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn stats(&self, kind: AgentKind) -> &KindStats {
        &self.stats[kind.index()]
    }

    /// Completed passes for `kind` since the scheduler was built.
    pub fn passes(&self, kind: AgentKind) -> u64 {
        self.stats[kind.index()].passes
    }

    /// Step every agent of one kind: partitions in parallel, then the
    /// boundary sequentially.
    ///
    /// Facts are appended to `facts` in partition order, followed by the
    /// boundary pass's facts.  If any partition task fails, every other task
    /// still runs to completion; the first failure in partition order is
    /// returned and the boundary pass is not run.
    pub fn step_all<A: Steppable>(
        &mut self,
        kind:       AgentKind,
        tick:       Tick,
        agents:     &mut [A],
        assignment: &KindAssignment,
        facts:      &mut FactSink,
    ) -> StepResult<StepReport> {
        let started = Instant::now();
        let before = facts.len();
        assignment.validate(kind, agents.len())?;

        let (buckets, boundary) = bucket(agents, assignment);

        let outcomes: Vec<PartitionOutcome> = self.pool.install(|| {
            buckets
                .into_par_iter()
                .enumerate()
                .map(|(p, bucket)| run_partition(kind, tick, PartitionId(p as u16), bucket))
                .collect()
        });

        let mut partitions = Vec::with_capacity(outcomes.len());
        let mut first_failure = None;
        for mut outcome in outcomes {
            facts.append(&mut outcome.facts);
            partitions.push(outcome.timing);
            if first_failure.is_none() {
                first_failure = outcome.failure;
            } else if let Some(other) = outcome.failure {
                error!(%kind, %tick, error = %other, "additional partition failure");
            }
        }
        if let Some(err) = first_failure {
            error!(%kind, %tick, error = %err, "partition task failed");
            return Err(err);
        }

        let boundary_agents = boundary.len();
        let boundary_started = Instant::now();
        let ctx = StepContext { tick, kind, partition: None };
        for (index, agent) in boundary {
            step_one(agent, &ctx, facts, index)?;
        }
        let boundary_elapsed = boundary_started.elapsed();

        let timing = TimingStats::from_samples(partitions.iter().map(|p| p.elapsed));
        let report = StepReport {
            kind,
            tick,
            partitions,
            boundary_agents,
            boundary_elapsed,
            timing,
            facts: facts.len() - before,
        };
        self.account(&report, started.elapsed());
        debug!(
            %kind, %tick,
            partitions = report.partitions.len(),
            boundary = boundary_agents,
            "stepping pass complete"
        );
        Ok(report)
    }

    /// Step every agent of one kind on the calling thread, in index order.
    ///
    /// Used when multi-threading is disabled; reported as a pass with no
    /// partitions.
    pub fn step_sequential<A: Steppable>(
        &mut self,
        kind:   AgentKind,
        tick:   Tick,
        agents: &mut [A],
        facts:  &mut FactSink,
    ) -> StepResult<StepReport> {
        let started = Instant::now();
        let before = facts.len();
        let ctx = StepContext { tick, kind, partition: None };
        for (index, agent) in agents.iter_mut().enumerate() {
            step_one(agent, &ctx, facts, index)?;
        }
        let elapsed = started.elapsed();
        let report = StepReport {
            kind,
            tick,
            partitions:       Vec::new(),
            boundary_agents:  agents.len(),
            boundary_elapsed: elapsed,
            timing:           TimingStats::default(),
            facts:            facts.len() - before,
        };
        self.account(&report, elapsed);
        Ok(report)
    }

    fn account(&mut self, report: &StepReport, wall: Duration) {
        let stats = &mut self.stats[report.kind.index()];
        stats.passes += 1;
        stats.interval_passes += 1;
        for p in &report.partitions {
            stats.partition.record(p.elapsed);
        }
        stats.boundary.record(report.boundary_elapsed);
        stats.pass.record(wall);
    }

    /// Log accumulated timing for every kind stepped since the last report,
    /// then reset the interval accumulators.
    pub fn report_time(&mut self, tick: Tick) -> Vec<TimingSummary> {
        let mut out = Vec::new();
        for kind in AgentKind::ALL {
            let stats = &mut self.stats[kind.index()];
            if stats.interval_passes == 0 {
                continue;
            }
            let summary = TimingSummary {
                kind,
                passes:      stats.interval_passes,
                min_ms:      stats.partition.min(),
                max_ms:      stats.partition.max(),
                mean_ms:     stats.partition.mean(),
                boundary_ms: stats.boundary.mean(),
            };
            info!(
                %tick, %kind,
                passes = summary.passes,
                min_ms = summary.min_ms,
                max_ms = summary.max_ms,
                mean_ms = summary.mean_ms,
                boundary_ms = summary.boundary_ms,
                "stepping time"
            );
            stats.reset_interval();
            out.push(summary);
        }
        out
    }

    /// Drain and stop the worker pool.  Call once, after the last pass.
    pub fn shutdown(self) {
        let passes: u64 = self.stats.iter().map(|s| s.passes).sum();
        info!(workers = self.workers, passes, "stepping pool shut down");
        drop(self.pool);
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Split `agents` into disjoint `&mut` buckets.
///
/// The boundary bucket holds the boundary list in its given order, then any
/// agent named by no list, in index order.  The assignment must already be
/// validated; a duplicate would simply be skipped.
fn bucket<'a, A>(
    agents:     &'a mut [A],
    assignment: &KindAssignment,
) -> (Vec<Bucket<'a, A>>, Bucket<'a, A>) {
    let mut cells: Vec<Option<&'a mut A>> = agents.iter_mut().map(Some).collect();
    let mut take = |i: usize| cells.get_mut(i).and_then(Option::take).map(|a| (i, a));

    let buckets: Vec<Bucket<'a, A>> = assignment
        .partitions()
        .iter()
        .map(|members| members.iter().filter_map(|&i| take(i)).collect())
        .collect();
    let mut boundary: Bucket<'a, A> =
        assignment.boundary().iter().filter_map(|&i| take(i)).collect();

    boundary.extend(
        cells
            .into_iter()
            .enumerate()
            .filter_map(|(i, cell)| cell.map(|a| (i, a))),
    );
    (buckets, boundary)
}

fn run_partition<A: Steppable>(
    kind:      AgentKind,
    tick:      Tick,
    partition: PartitionId,
    bucket:    Bucket<'_, A>,
) -> PartitionOutcome {
    let started = Instant::now();
    let ctx = StepContext { tick, kind, partition: Some(partition) };
    let agents = bucket.len();
    let mut facts = FactSink::new();
    let mut failure = None;
    for (index, agent) in bucket {
        if let Err(err) = step_one(agent, &ctx, &mut facts, index) {
            failure = Some(err);
            break;
        }
    }
    PartitionOutcome {
        timing: PartitionTiming { partition, agents, elapsed: started.elapsed() },
        facts,
        failure,
    }
}

/// Step one agent, turning both `Err` returns and panics into `StepError`.
fn step_one<A: Steppable>(
    agent: &mut A,
    ctx:   &StepContext,
    facts: &mut FactSink,
    index: usize,
) -> StepResult<()> {
    match panic::catch_unwind(AssertUnwindSafe(|| agent.step(ctx, facts))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(StepError::Agent {
            kind:      ctx.kind,
            partition: ctx.partition,
            index,
            tick:      ctx.tick,
            source,
        }),
        Err(payload) => Err(StepError::Panicked {
            kind:      ctx.kind,
            partition: ctx.partition,
            index,
            tick:      ctx.tick,
            message:   panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

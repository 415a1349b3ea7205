//! Fluent builder for constructing a [`Sim`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use ts_collect::{
    ConsumerHandle, ConsumerOptions, DataCollector, Janitor, SnapshotBuffer, StartAt, TickConsumer,
};
use ts_core::{FactSink, SimConfig, Tick};
use ts_output::{CsvWriter, JsonLinesWriter, OutputConsumer};
use ts_partition::{AdaptiveCadence, BlockPartitioner, Partitioner};
use ts_schedule::Schedule;
use ts_step::SteppingScheduler;
use ts_sync::{SyncController, TickStreamer};

use crate::activity::{end_table, standard_table};
use crate::context::population_view;
use crate::{Sim, SimContext, SimResult, World};

/// Fluent builder for [`Sim<W>`].
///
/// # Optional inputs (have defaults)
///
/// | Method                   | Default                                   |
/// |--------------------------|-------------------------------------------|
/// | `.partitioner(p)`        | [`BlockPartitioner`]                      |
/// | `.consumer(c)`           | none beyond the configured file outputs   |
/// | `.file_outputs(false)`   | CSV / JSON-lines per `collect` section    |
///
/// # Example
///
/// ```rust,ignore
/// let mut sim = SimBuilder::new(config, world)
///     .partitioner(MetisLikePartitioner::new(graph))
///     .consumer(LiveDashboard::new())
///     .build()?;
/// sim.run(&mut NoopObserver)?;
/// ```
pub struct SimBuilder<W: World> {
    config:       SimConfig,
    world:        W,
    partitioner:  Option<Box<dyn Partitioner>>,
    consumers:    Vec<Box<dyn TickConsumer>>,
    file_outputs: bool,
}

impl<W: World> SimBuilder<W> {
    pub fn new(config: SimConfig, world: W) -> Self {
        Self {
            config,
            world,
            partitioner:  None,
            consumers:    Vec::new(),
            file_outputs: true,
        }
    }

    /// Supply the partition provider.
    pub fn partitioner<P: Partitioner + 'static>(mut self, partitioner: P) -> Self {
        self.partitioner = Some(Box::new(partitioner));
        self
    }

    /// Register an extra buffer consumer (runs on its own thread).
    pub fn consumer<C: TickConsumer>(mut self, consumer: C) -> Self {
        self.consumers.push(Box::new(consumer));
        self
    }

    /// Enable or disable the CSV / JSON-lines writers named in the config.
    pub fn file_outputs(mut self, on: bool) -> Self {
        self.file_outputs = on;
        self
    }

    /// Validate the configuration, compute the initial partition, start the
    /// worker pool, consumers, janitor and control server, and return a
    /// ready-to-run [`Sim`].  Every failure here is a setup error; no tick
    /// has run yet.
    pub fn build(self) -> SimResult<Sim<W>> {
        let config = self.config;
        config.validate()?;
        let partitions = config.partition.partitions;

        // ── Initial partition ─────────────────────────────────────────────
        let mut partitioner = self
            .partitioner
            .unwrap_or_else(|| Box::new(BlockPartitioner::new()) as Box<dyn Partitioner>);
        let view = population_view(&self.world, Tick::ZERO);
        let mut assignment = partitioner.partition(&view, partitions)?;
        assignment.set_epoch(0);
        assignment.validate(view.counts)?;
        info!(partitioner = partitioner.name(), partitions, "initial partition computed");

        let workers = if config.multi_threading { partitions } else { 1 };
        let stepper = SteppingScheduler::new(workers)?;

        // ── Schedule ──────────────────────────────────────────────────────
        let mut schedule = Schedule::new();
        for (params, activity) in standard_table(&config)? {
            schedule.schedule(params, activity)?;
        }
        for (priority, activity) in end_table()? {
            schedule.schedule_at_end(activity, priority);
        }

        // ── Control plane ─────────────────────────────────────────────────
        let sync = if config.sync.enabled { Some(SyncController::bind(&config.sync)?) } else { None };

        // ── Collection ────────────────────────────────────────────────────
        let buffer = SnapshotBuffer::new();
        let mut consumers = Vec::new();
        let mut janitor = None;
        if config.collect.enabled {
            let c = &config.collect;
            let options = ConsumerOptions {
                start:  StartAt::Tick(Tick::ZERO),
                stride: c.ticks_between_records,
                poll:   Duration::from_millis(c.consumer_poll_ms),
            };
            if self.file_outputs {
                let dir = Path::new(&c.output_dir);
                if c.write_csv {
                    let consumer = OutputConsumer::new("csv", CsvWriter::new(dir)?, &config);
                    consumers.push(ConsumerHandle::spawn(&buffer, consumer, options.clone())?);
                }
                if c.write_json {
                    let consumer = OutputConsumer::new("jsonl", JsonLinesWriter::new(dir)?, &config);
                    consumers.push(ConsumerHandle::spawn(&buffer, consumer, options.clone())?);
                }
            }
            if let Some(sync) = sync.as_ref().filter(|_| config.sync.stream_ticks) {
                let streamer = TickStreamer::new(sync.outbox());
                consumers.push(ConsumerHandle::spawn(&buffer, streamer, options.clone())?);
            }
            for consumer in self.consumers {
                consumers.push(ConsumerHandle::spawn(&buffer, consumer, options.clone())?);
            }
            let period = Duration::from_millis(c.cleanup_interval_ms);
            janitor = Some(Janitor::spawn(Arc::clone(&buffer), period)?);
        }

        let ctx = SimContext {
            clock: config.make_clock(),
            cadence: AdaptiveCadence::new(&config.partition),
            config,
            schedule,
            partitioner,
            assignment,
            stepper: Some(stepper),
            facts: FactSink::new(),
            collector: DataCollector::new(buffer),
            janitor,
            consumers,
            sync,
        };
        Ok(Sim::from_parts(ctx, self.world))
    }
}

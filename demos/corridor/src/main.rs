//! corridor: a synthetic arterial corridor on the rust_ts substrate.
//!
//! ```text
//! corridor [config.json]
//! ```
//!
//! Without a config file the run uses the defaults: 3600 one-second ticks,
//! four partitions, CSV output under `output/`.  Set `sync.enabled` to drive
//! the run from a remote WebSocket controller; `RUST_LOG` controls verbosity.

mod world;

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ts_core::{SimConfig, Tick};
use ts_partition::BlockPartitioner;
use ts_sim::{SimBuilder, SimObserver, TickReport};

use world::{Corridor, Incident};

// ── Constants ─────────────────────────────────────────────────────────────────

const ROADS: usize = 64;
const SEED:  u64   = 42;

// ── Progress ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Progress {
    ticks:  u64,
    facts:  usize,
    stored: u64,
}

impl SimObserver for Progress {
    fn on_tick_end(&mut self, report: &TickReport) {
        self.ticks += 1;
        self.facts += report.facts;
        self.stored += u64::from(report.stored);
    }

    fn on_sim_end(&mut self, final_tick: Tick) {
        info!(%final_tick, ticks = self.ticks, facts = self.facts, stored = self.stored, "run complete");
    }
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => SimConfig::from_file(Path::new(&path)).with_context(|| format!("loading {path}"))?,
        None => SimConfig::default(),
    };
    info!(
        ticks = config.total_ticks,
        partitions = config.partition.partitions,
        synchronized = config.sync.enabled,
        output = %config.collect.output_dir.display(),
        "configuration loaded"
    );

    let world = Corridor::new(ROADS, SEED).with_incident(Incident {
        road:  ROADS / 2,
        from:  Tick(config.total_ticks / 4),
        until: Tick(config.total_ticks / 2),
    });

    let mut sim = SimBuilder::new(config, world)
        .partitioner(BlockPartitioner::new())
        .build()
        .context("building simulation")?;
    if let Some(addr) = sim.sync_addr() {
        info!(%addr, "waiting for controller at ws://{addr}/");
    }

    let mut progress = Progress::default();
    let t0 = Instant::now();
    sim.run(&mut progress)?;

    info!(
        elapsed_s = t0.elapsed().as_secs_f64(),
        released = sim.world.released(),
        on_network = sim.world.vehicles(),
        "corridor finished"
    );
    Ok(())
}

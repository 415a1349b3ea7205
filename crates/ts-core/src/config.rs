//! Simulation configuration.
//!
//! Loaded from a JSON document.  Every key is optional; missing keys take the
//! defaults below.  [`SimConfig::validate`] runs on every load so that bad
//! values fail at startup, before any tick is scheduled.
//!
//! ```json
//! {
//!   "total_ticks": 3600,
//!   "partition": { "partitions": 4, "refresh_interval": 600 },
//!   "sync": { "enabled": true, "listen_addr": "127.0.0.1:4000" }
//! }
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{CoreError, CoreResult, SimClock, Tick};

// ── Defaults ──────────────────────────────────────────────────────────────────

fn default_tick_duration_secs() -> u32 { 1 }
fn default_total_ticks() -> u64 { 3_600 }
fn default_true() -> bool { true }
fn default_metrics_display_interval() -> u64 { 1_000 }

fn default_one() -> u64 { 1 }
fn default_speed_refresh_interval() -> u64 { 60 }
fn default_zone_step_interval() -> u64 { 10 }
fn default_charging_step_interval() -> u64 { 20 }

fn default_partitions() -> usize { 4 }
fn default_refresh_interval() -> u64 { 600 }
fn default_max_refresh_interval() -> u64 { 3_000 }
fn default_load_threshold() -> usize { 1_000 }

fn default_cleanup_interval_ms() -> u64 { 1_000 }
fn default_consumer_poll_ms() -> u64 { 20 }
fn default_output_dir() -> PathBuf { PathBuf::from("output") }

fn default_listen_addr() -> String { "127.0.0.1:4000".to_owned() }
fn default_nudge_timeout_ms() -> u64 { 2_000 }
fn default_reconnect_timeout_ms() -> u64 { 60_000 }

// ── SimConfig ─────────────────────────────────────────────────────────────────

/// Top-level simulation configuration.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct SimConfig {
    /// Unix timestamp for tick 0.
    #[serde(default)]
    pub start_unix_secs: i64,

    /// Simulated seconds per tick (the step size).
    #[serde(default = "default_tick_duration_secs")]
    pub tick_duration_secs: u32,

    /// Total ticks to simulate; the run stops before `Tick(total_ticks)`.
    #[serde(default = "default_total_ticks")]
    pub total_ticks: u64,

    /// Step partitions on the worker pool.  `false` steps every agent on the
    /// simulation thread in index order.
    #[serde(default = "default_true")]
    pub multi_threading: bool,

    /// Log a progress line every N ticks.
    #[serde(default = "default_metrics_display_interval")]
    pub metrics_display_interval: u64,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub partition: PartitionConfig,

    #[serde(default)]
    pub collect: CollectConfig,

    #[serde(default)]
    pub sync: SyncConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            start_unix_secs:          0,
            tick_duration_secs:       default_tick_duration_secs(),
            total_ticks:              default_total_ticks(),
            multi_threading:          true,
            metrics_display_interval: default_metrics_display_interval(),
            schedule:                 ScheduleConfig::default(),
            partition:                PartitionConfig::default(),
            collect:                  CollectConfig::default(),
            sync:                     SyncConfig::default(),
        }
    }
}

impl SimConfig {
    /// Read, parse and validate a JSON configuration file.
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(text: &str) -> CoreResult<Self> {
        let config: SimConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// The tick at which the simulation ends (exclusive upper bound).
    #[inline]
    pub fn end_tick(&self) -> Tick {
        Tick(self.total_ticks)
    }

    /// Construct a `SimClock` pre-configured for this run.
    pub fn make_clock(&self) -> SimClock {
        SimClock::new(self.start_unix_secs, self.tick_duration_secs)
    }

    /// Reject values no run could use.
    pub fn validate(&self) -> CoreResult<()> {
        if self.tick_duration_secs == 0 {
            return Err(CoreError::invalid("tick_duration_secs", "must be at least 1"));
        }
        positive("metrics_display_interval", self.metrics_display_interval)?;

        let s = &self.schedule;
        positive("schedule.event_check_interval", s.event_check_interval)?;
        positive("schedule.demand_refresh_interval", s.demand_refresh_interval)?;
        positive("schedule.speed_refresh_interval", s.speed_refresh_interval)?;
        positive("schedule.zone_step_interval", s.zone_step_interval)?;
        positive("schedule.charging_step_interval", s.charging_step_interval)?;
        positive("schedule.signal_step_interval", s.signal_step_interval)?;

        let p = &self.partition;
        if p.partitions == 0 || p.partitions > u16::MAX as usize {
            return Err(CoreError::invalid(
                "partition.partitions",
                format!("must be in 1..={}, got {}", u16::MAX, p.partitions),
            ));
        }
        positive("partition.refresh_interval", p.refresh_interval)?;
        if p.max_refresh_interval < p.refresh_interval {
            return Err(CoreError::invalid(
                "partition.max_refresh_interval",
                format!(
                    "{} is below refresh_interval {}",
                    p.max_refresh_interval, p.refresh_interval
                ),
            ));
        }

        let c = &self.collect;
        positive("collect.cleanup_interval_ms", c.cleanup_interval_ms)?;
        positive("collect.consumer_poll_ms", c.consumer_poll_ms)?;
        positive("collect.ticks_between_records", c.ticks_between_records)?;

        let y = &self.sync;
        positive("sync.nudge_timeout_ms", y.nudge_timeout_ms)?;
        if y.enabled {
            y.listen_addr.parse::<SocketAddr>().map_err(|e| {
                CoreError::invalid("sync.listen_addr", format!("{:?}: {e}", y.listen_addr))
            })?;
            if y.on_disconnect == DisconnectPolicy::Fail {
                positive("sync.reconnect_timeout_ms", y.reconnect_timeout_ms)?;
            }
        }
        Ok(())
    }
}

fn positive(field: &'static str, value: u64) -> CoreResult<()> {
    if value == 0 {
        return Err(CoreError::invalid(field, "must be at least 1"));
    }
    Ok(())
}

// ── Sections ──────────────────────────────────────────────────────────────────

/// Intervals (in ticks) of the periodic activities.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_one")]
    pub event_check_interval:    u64,
    #[serde(default = "default_one")]
    pub demand_refresh_interval: u64,
    #[serde(default = "default_speed_refresh_interval")]
    pub speed_refresh_interval:  u64,
    #[serde(default = "default_zone_step_interval")]
    pub zone_step_interval:      u64,
    #[serde(default = "default_charging_step_interval")]
    pub charging_step_interval:  u64,
    #[serde(default = "default_one")]
    pub signal_step_interval:    u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            event_check_interval:    1,
            demand_refresh_interval: 1,
            speed_refresh_interval:  default_speed_refresh_interval(),
            zone_step_interval:      default_zone_step_interval(),
            charging_step_interval:  default_charging_step_interval(),
            signal_step_interval:    1,
        }
    }
}

/// Partitioning and re-partitioning cadence.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PartitionConfig {
    /// Number of partitions; also the worker-pool size.
    #[serde(default = "default_partitions")]
    pub partitions: usize,

    /// Ticks between partition-refresh checks.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,

    /// Longest time an assignment may be kept before a forced refresh.
    #[serde(default = "default_max_refresh_interval")]
    pub max_refresh_interval: u64,

    /// Network load (vehicles) at or above which a refresh happens early.
    #[serde(default = "default_load_threshold")]
    pub load_threshold: usize,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            partitions:           default_partitions(),
            refresh_interval:     default_refresh_interval(),
            max_refresh_interval: default_max_refresh_interval(),
            load_threshold:       default_load_threshold(),
        }
    }
}

/// Snapshot buffer, janitor, and output consumers.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CollectConfig {
    /// Collect tick snapshots at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Janitor sweep period.
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,

    /// How long a consumer waits before retrying a not-ready tick.
    #[serde(default = "default_consumer_poll_ms")]
    pub consumer_poll_ms: u64,

    /// Consumer stride: after reading tick `t` the next request is
    /// `t + ticks_between_records`.
    #[serde(default = "default_one")]
    pub ticks_between_records: u64,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_true")]
    pub write_csv: bool,

    #[serde(default)]
    pub write_json: bool,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            enabled:               true,
            cleanup_interval_ms:   default_cleanup_interval_ms(),
            consumer_poll_ms:      default_consumer_poll_ms(),
            ticks_between_records: 1,
            output_dir:            default_output_dir(),
            write_csv:             true,
            write_json:            false,
        }
    }
}

/// What the gate does when the controller goes away mid-run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectPolicy {
    /// Block until a controller reconnects, then resume.
    #[default]
    Wait,
    /// Fail the run if no controller reconnects within
    /// `reconnect_timeout_ms`.
    Fail,
}

/// The network control plane.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct SyncConfig {
    /// Gate tick advancement behind a remote controller.
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Liveness nudge period while ARMED.
    #[serde(default = "default_nudge_timeout_ms")]
    pub nudge_timeout_ms: u64,

    #[serde(default)]
    pub on_disconnect: DisconnectPolicy,

    #[serde(default = "default_reconnect_timeout_ms")]
    pub reconnect_timeout_ms: u64,

    /// Stream sealed snapshots to the controller as `TICK_MSG`.
    #[serde(default)]
    pub stream_ticks: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled:              false,
            listen_addr:          default_listen_addr(),
            nudge_timeout_ms:     default_nudge_timeout_ms(),
            on_disconnect:        DisconnectPolicy::Wait,
            reconnect_timeout_ms: default_reconnect_timeout_ms(),
            stream_ticks:         false,
        }
    }
}

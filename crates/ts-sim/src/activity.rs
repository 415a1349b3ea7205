//! The activities the global scheduler orders within a tick.

use std::fmt;

use ts_core::{AgentKind, SimConfig, Tick};
use ts_schedule::{Priority, ScheduleParams, ScheduleResult};

/// Something the tick loop does at a scheduled tick.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Activity {
    TickStart,
    HandleEvents,
    LoadDemand,
    RefreshSpeeds,
    Step(AgentKind),
    DisplayMetrics,
    ReportTiming,
    Repartition,
    TickStop,
    /// Registered with `schedule_at_end`; never drained by a tick.
    End(EndAction),
}

impl Activity {
    pub fn name(self) -> &'static str {
        match self {
            Activity::TickStart      => "tick start",
            Activity::HandleEvents   => "event handling",
            Activity::LoadDemand     => "demand loading",
            Activity::RefreshSpeeds  => "speed refresh",
            Activity::Step(_)        => "stepping",
            Activity::DisplayMetrics => "metrics display",
            Activity::ReportTiming   => "timing report",
            Activity::Repartition    => "partition refresh",
            Activity::TickStop       => "tick stop",
            Activity::End(_)         => "end of run",
        }
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activity::Step(kind) => write!(f, "step {kind}"),
            Activity::End(action) => write!(f, "end: {action:?}"),
            other => f.write_str(other.name()),
        }
    }
}

/// Run once after the final tick, in this order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EndAction {
    StopCollection,
    CloseConsumers,
    ShutdownPool,
    EndControl,
}

// ── Standard table ────────────────────────────────────────────────────────────

pub const PRIORITY_EVENTS:      i32 = -30;
pub const PRIORITY_DEMAND:      i32 = -20;
pub const PRIORITY_SPEED:       i32 = -10;
pub const PRIORITY_ROADS:       i32 = 0;
pub const PRIORITY_FACILITIES:  i32 = 10;
pub const PRIORITY_METRICS:     i32 = 50;
pub const PRIORITY_TIMING:      i32 = 90;
pub const PRIORITY_REPARTITION: i32 = 100;

/// Every periodic activity of a run with its schedule parameters.
pub fn standard_table(config: &SimConfig) -> ScheduleResult<Vec<(ScheduleParams, Activity)>> {
    let s = &config.schedule;
    let refresh = config.partition.refresh_interval;
    let every = |interval: u64, priority: i32| -> ScheduleResult<ScheduleParams> {
        Ok(ScheduleParams::repeating(Tick::ZERO, interval, Priority::new(priority)?))
    };

    Ok(vec![
        (ScheduleParams::repeating(Tick::ZERO, 1, Priority::FIRST), Activity::TickStart),
        (every(s.event_check_interval, PRIORITY_EVENTS)?, Activity::HandleEvents),
        (every(s.demand_refresh_interval, PRIORITY_DEMAND)?, Activity::LoadDemand),
        (every(s.speed_refresh_interval, PRIORITY_SPEED)?, Activity::RefreshSpeeds),
        (every(1, PRIORITY_ROADS)?, Activity::Step(AgentKind::Road)),
        (every(s.zone_step_interval, PRIORITY_FACILITIES)?, Activity::Step(AgentKind::Zone)),
        (every(s.charging_step_interval, PRIORITY_FACILITIES)?, Activity::Step(AgentKind::ChargingStation)),
        (every(s.signal_step_interval, PRIORITY_FACILITIES)?, Activity::Step(AgentKind::Signal)),
        (every(config.metrics_display_interval, PRIORITY_METRICS)?, Activity::DisplayMetrics),
        (
            ScheduleParams::repeating(Tick(refresh), refresh, Priority::new(PRIORITY_TIMING)?),
            Activity::ReportTiming,
        ),
        (
            ScheduleParams::repeating(Tick(refresh), refresh, Priority::new(PRIORITY_REPARTITION)?),
            Activity::Repartition,
        ),
        (ScheduleParams::repeating(Tick::ZERO, 1, Priority::LAST), Activity::TickStop),
    ])
}

/// End-of-run actions with their priorities.
pub fn end_table() -> ScheduleResult<Vec<(Priority, Activity)>> {
    Ok(vec![
        (Priority::new(0)?, Activity::End(EndAction::StopCollection)),
        (Priority::new(10)?, Activity::End(EndAction::CloseConsumers)),
        (Priority::new(20)?, Activity::End(EndAction::ShutdownPool)),
        (Priority::new(30)?, Activity::End(EndAction::EndControl)),
    ])
}

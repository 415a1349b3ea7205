use thiserror::Error;

use ts_collect::CollectError;
use ts_core::{CoreError, StepFailure, Tick};
use ts_output::OutputError;
use ts_partition::PartitionError;
use ts_schedule::ScheduleError;
use ts_step::StepError;
use ts_sync::SyncError;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("simulation configuration error: {0}")]
    Config(#[from] CoreError),

    #[error("partition assignment error: {0}")]
    Partition(#[from] PartitionError),

    #[error("stepping failed: {0}")]
    Step(#[from] StepError),

    #[error("schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("data collection error: {0}")]
    Collect(#[from] CollectError),

    #[error("control plane error: {0}")]
    Sync(#[from] SyncError),

    #[error("output error: {0}")]
    Output(#[from] OutputError),

    #[error("simulation has already finished")]
    Finished,

    #[error("{activity} failed at {tick}: {source}")]
    World {
        activity: &'static str,
        tick:     Tick,
        #[source]
        source:   StepFailure,
    },
}

pub type SimResult<T> = Result<T, SimError>;

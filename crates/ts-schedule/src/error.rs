use thiserror::Error;

use ts_core::Tick;

use crate::ActivityHandle;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("priority {0} is reserved for tick brackets")]
    ReservedPriority(i32),

    #[error("repeating activities need an interval of at least 1 tick")]
    ZeroInterval,

    #[error("no scheduled activity with handle {0}")]
    UnknownActivity(ActivityHandle),

    #[error("{tick} was already drained; next drainable tick is {next}")]
    TickAlreadyDrained { tick: Tick, next: Tick },
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;

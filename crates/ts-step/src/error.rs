use thiserror::Error;

use ts_core::{AgentKind, PartitionId, StepFailure, Tick};
use ts_partition::PartitionError;

/// Errors raised by a stepping pass.
///
/// Agent failures are fatal for the run: a failed partition's agents cannot
/// be skipped on later ticks without corrupting the simulation.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("{kind} agent {index} failed at {tick} (partition {partition:?}): {source}")]
    Agent {
        kind:      AgentKind,
        partition: Option<PartitionId>,
        index:     usize,
        tick:      Tick,
        #[source]
        source:    StepFailure,
    },

    #[error("{kind} agent {index} panicked at {tick} (partition {partition:?}): {message}")]
    Panicked {
        kind:      AgentKind,
        partition: Option<PartitionId>,
        index:     usize,
        tick:      Tick,
        message:   String,
    },

    #[error("invalid partition assignment: {0}")]
    Assignment(#[from] PartitionError),

    #[error("worker pool needs at least one thread")]
    ZeroWorkers,

    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

pub type StepResult<T> = Result<T, StepError>;

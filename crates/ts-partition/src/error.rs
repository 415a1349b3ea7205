use thiserror::Error;

use ts_core::AgentKind;

#[derive(Debug, Error)]
pub enum PartitionError {
    #[error("{kind} index {index} is out of range for a population of {len}")]
    IndexOutOfRange {
        kind:  AgentKind,
        index: usize,
        len:   usize,
    },

    #[error("{kind} index {index} is assigned more than once")]
    DuplicateIndex {
        kind:  AgentKind,
        index: usize,
    },

    #[error("partition count must be at least 1")]
    ZeroPartitions,

    #[error("partition provider failed: {0}")]
    Provider(String),
}

pub type PartitionResult<T> = Result<T, PartitionError>;

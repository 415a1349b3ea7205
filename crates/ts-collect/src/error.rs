use thiserror::Error;

use ts_core::Tick;

use crate::SinkError;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("cannot open {tick}: last opened tick was {last}")]
    TickOutOfOrder { tick: Tick, last: Tick },

    #[error("cannot open {requested} while {open} is still open")]
    SnapshotAlreadyOpen { open: Tick, requested: Tick },

    #[error("no snapshot is open")]
    NoOpenSnapshot,

    #[error("data collection has been stopped")]
    Stopped,

    #[error("consumer `{consumer}` failed: {source}")]
    Sink {
        consumer: String,
        #[source]
        source:   SinkError,
    },

    #[error("consumer `{0}` panicked")]
    ConsumerPanicked(String),

    #[error("failed to spawn thread: {0}")]
    Spawn(#[source] std::io::Error),
}

pub type CollectResult<T> = Result<T, CollectError>;

//! `ts-step`: the partitioned stepping scheduler.
//!
//! # One stepping pass
//!
//! ```text
//! step_all(kind):
//!   ① bucket       split the population into one `&mut` bucket per partition
//!                  plus the boundary bucket (boundary list, then anything
//!                  the assignment does not name, in index order).
//!   ② fan-out      one task per partition on the fixed worker pool; each
//!                  task steps its agents in order into a private FactSink.
//!   ③ fan-in       join every task, merge sinks in partition order, raise
//!                  the first failure (partition order) if any.
//!   ④ boundary     step boundary agents sequentially on the caller thread.
//! ```
//!
//! The boundary pass never overlaps the parallel phase, so agents whose
//! effects cross partitions never race with partition workers.
//!
//! | Module        | Contents                                               |
//! |---------------|--------------------------------------------------------|
//! | [`scheduler`] | `SteppingScheduler`, `StepReport`, `PartitionTiming`   |
//! | [`stats`]     | `TimingStats`, `KindStats`, `TimingSummary`            |
//! | [`error`]     | `StepError`, `StepResult<T>`                           |

pub mod error;
pub mod scheduler;
pub mod stats;


pub use error::{StepError, StepResult};
pub use scheduler::{PartitionTiming, StepReport, SteppingScheduler};
pub use stats::{KindStats, TimingStats, TimingSummary};

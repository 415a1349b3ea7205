//! `ts-partition`: how the stepping scheduler learns which agents may be
//! stepped in parallel.
//!
//! Graph partitioning itself is an external concern.  This crate defines the
//! shape of its output ([`PartitionAssignment`]), the seam through which it is
//! requested ([`Partitioner`]), two simple built-in providers, and the
//! adaptive cadence that decides when a refresh is due.
//!
//! | Module         | Contents                                                |
//! |----------------|---------------------------------------------------------|
//! | [`assignment`] | `KindAssignment`, `PartitionAssignment`, `Slot`         |
//! | [`provider`]   | `Partitioner` trait, `PopulationView`                   |
//! | [`builtin`]    | `BlockPartitioner`, `FixedPartitioner`                  |
//! | [`cadence`]    | `AdaptiveCadence`, `RefreshDecision`                    |
//! | [`error`]      | `PartitionError`, `PartitionResult<T>`                  |

pub mod assignment;
pub mod builtin;
pub mod cadence;
pub mod error;
pub mod provider;


pub use assignment::{KindAssignment, PartitionAssignment, Slot};
pub use builtin::{BlockPartitioner, FixedPartitioner};
pub use cadence::{AdaptiveCadence, RefreshDecision, RefreshReason};
pub use error::{PartitionError, PartitionResult};
pub use provider::{Partitioner, PopulationView};

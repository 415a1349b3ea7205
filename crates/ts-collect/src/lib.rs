//! `ts-collect`: the tick snapshot buffer and its consumers.
//!
//! # Data flow
//!
//! ```text
//!  sim thread                       buffer                    consumer threads
//!  ──────────                       ──────                    ────────────────
//!  open(t) ─► TickSnapshot (open)
//!  absorb(facts)
//!  seal() ──► Arc<TickSnapshot> ──► BTreeMap<Tick, Arc<_>> ◄── next_tick(cursor)
//!                                          ▲
//!                       janitor thread ────┘ evict < min(cursor)
//! ```
//!
//! The simulation thread is the only writer.  Sealed snapshots are shared as
//! `Arc` and never mutated, so readers only hold the buffer lock long enough
//! to clone an `Arc`.
//!
//! | Module        | Contents                                                |
//! |---------------|---------------------------------------------------------|
//! | [`snapshot`]  | `TickSnapshot`                                          |
//! | [`buffer`]    | `SnapshotBuffer`, `NextTick`, `ConsumerCursor`, `Sweep` |
//! | [`collector`] | `DataCollector`, `CollectionState`                      |
//! | [`janitor`]   | `Janitor` (periodic eviction thread)                    |
//! | [`consumer`]  | `TickConsumer` trait, `ConsumerHandle`, options         |
//! | [`error`]     | `CollectError`, `CollectResult<T>`                      |

pub mod buffer;
pub mod collector;
pub mod consumer;
pub mod error;
pub mod janitor;
pub mod snapshot;

#[cfg(test)]
mod tests;

pub use buffer::{ConsumerCursor, NextTick, SnapshotBuffer, Sweep};
pub use collector::{CollectionState, DataCollector};
pub use consumer::{ConsumerHandle, ConsumerOptions, ConsumerSummary, SinkError, StartAt, TickConsumer};
pub use error::{CollectError, CollectResult};
pub use janitor::Janitor;
pub use snapshot::TickSnapshot;

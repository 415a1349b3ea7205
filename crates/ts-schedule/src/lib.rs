//! `ts-schedule`: a generic discrete-event schedule.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                   |
//! |--------------|------------------------------------------------------------|
//! | [`params`]   | `Priority` (with reserved `FIRST`/`LAST`), `ScheduleParams`|
//! | [`schedule`] | `Schedule<A>` (`BTreeMap<Tick, Vec<Entry>>`), `ActivityHandle` |
//! | [`error`]    | `ScheduleError`, `ScheduleResult<T>`                        |
//!
//! # Ordering model (summary)
//!
//! Each registered activity carries `(start, interval, priority)`.  At tick
//! `t` the schedule yields every activity due at `t`:
//!
//! ```text
//! due(a, t)   = t ≥ a.start  and  (t - a.start) % a.interval == 0
//! order       = ascending priority, then registration order
//! ```
//!
//! `Priority::FIRST` and `Priority::LAST` sit outside every user priority,
//! so bracket activities always open and close a tick.

pub mod error;
pub mod params;
pub mod schedule;

#[cfg(test)]
mod tests;

pub use error::{ScheduleError, ScheduleResult};
pub use params::{Priority, ScheduleParams};
pub use schedule::{ActivityHandle, Schedule};

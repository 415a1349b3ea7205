//! `ts-core`: foundational types for the `rust_ts` traffic simulation
//! substrate.
//!
//! This crate is a dependency of every other `ts-*` crate.  It has no `ts-*`
//! dependencies and only small external ones (`thiserror`, `serde`,
//! `serde_json`).
//!
//! # What lives here
//!
//! | Module       | Contents                                                  |
//! |--------------|-----------------------------------------------------------|
//! | [`ids`]      | `AgentId`, `PartitionId`, `ConsumerId`, `SessionId`       |
//! | [`time`]     | `Tick`, `SimClock`                                        |
//! | [`kind`]     | `AgentKind` (roads, zones, charging stations, signals)    |
//! | [`fact`]     | `Fact`, `FactKind`, `FactSink`                            |
//! | [`step`]     | `Steppable`, `StepContext`, `StepFailure`                 |
//! | [`config`]   | `SimConfig` and its sections, JSON loading, validation    |
//! | [`error`]    | `CoreError`, `CoreResult`                                 |

pub mod config;
pub mod error;
pub mod fact;
pub mod ids;
pub mod kind;
pub mod step;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::{
    CollectConfig, DisconnectPolicy, PartitionConfig, ScheduleConfig, SimConfig, SyncConfig,
};
pub use error::{CoreError, CoreResult};
pub use fact::{Fact, FactKind, FactSink};
pub use ids::{AgentId, ConsumerId, PartitionId, SessionId};
pub use kind::AgentKind;
pub use step::{StepContext, StepFailure, Steppable};
pub use time::{SimClock, Tick};

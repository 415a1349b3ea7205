//! `ts-sync`: lets one external controller pace the tick loop.
//!
//! # Control flow
//!
//! ```text
//!  controller ──WS───► acceptor thread ── second session? ──► ANS_rejected, close
//!                            │
//!                            ▼
//!                      session thread ── STEP_x ──► SyncGate (counter := NUM)
//!                            │
//!                            └─ CTRL_* / QUERY_* ──► channel ──► sim thread
//!                                                               (ControlHandler)
//!  sim thread:  SyncController::await_tick(t)
//!               blocks while ARMED, nudges {MSG_TYPE:"STEP",TICK:t} on timeout
//! ```
//!
//! One JSON object per WebSocket text frame in both directions.  Each session
//! thread owns its socket; other threads queue frames through [`Outbox`].
//!
//! | Module         | Contents                                             |
//! |----------------|------------------------------------------------------|
//! | [`protocol`]   | `Inbound` parsing, outbound message builders         |
//! | [`gate`]       | `SyncGate`, `GateState`                              |
//! | [`server`]     | `ControlServer` (acceptor + session threads), `Outbox` |
//! | [`controller`] | `SyncController`, `ControlHandler`, `AwaitOutcome`   |
//! | [`streamer`]   | `TickStreamer` (`TICK_MSG` consumer)                 |
//! | [`error`]      | `SyncError`, `ProtocolError`                         |

pub mod controller;
pub mod error;
pub mod gate;
pub mod protocol;
pub mod server;
pub mod streamer;

#[cfg(test)]
mod tests;

pub use controller::{AwaitOutcome, ControlHandler, ControlReply, SyncController};
pub use error::{ProtocolError, ProtocolResult, SyncError, SyncResult};
pub use gate::{GateState, SyncGate};
pub use protocol::Inbound;
pub use server::{ControlRequest, ControlServer, Outbox};
pub use streamer::TickStreamer;

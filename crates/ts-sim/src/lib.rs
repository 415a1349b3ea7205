//! `ts-sim`: the global event scheduler for the rust_ts substrate.
//!
//! # One tick
//!
//! ```text
//! [sync]  await_tick(t)       block while the gate is ARMED (synchronized mode)
//! FIRST   tick start          open the tick's snapshot
//!  -30    event handling      closures and incidents apply first
//!  -20    demand loading
//!  -10    speed refresh       travel times see this tick's events
//!    0    step roads          every tick, partition-parallel
//!   10    step zones / stations / signals   at their own intervals
//!   50    display metrics
//!   90    report step timing  every refresh interval
//!  100    partition refresh   last, so the whole tick used one assignment
//! LAST    tick stop           seal the snapshot
//! ```
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use ts_core::SimConfig;
//! use ts_sim::{NoopObserver, SimBuilder};
//!
//! let mut sim = SimBuilder::new(config, world)
//!     .partitioner(BlockPartitioner::new())
//!     .build()?;
//! sim.run(&mut NoopObserver)?;
//! ```

pub mod activity;
pub mod builder;
pub mod context;
pub mod error;
pub mod observer;
pub mod sim;
pub mod world;


pub use activity::{Activity, EndAction};
pub use builder::SimBuilder;
pub use context::SimContext;
pub use error::{SimError, SimResult};
pub use observer::{NoopObserver, SimObserver, TickReport};
pub use sim::Sim;
pub use world::World;

//! The `Steppable` trait: any entity with a per-tick update.
//!
//! Agents are opaque to the substrate.  The stepping scheduler only needs to
//! call `step` once per pass and to move agents across worker threads, hence
//! the `Send` bound.

use thiserror::Error;

use crate::{AgentKind, FactSink, PartitionId, Tick};

/// Read-only information handed to every `step` call.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StepContext {
    pub tick:      Tick,
    pub kind:      AgentKind,
    /// `None` during the sequential boundary pass.
    pub partition: Option<PartitionId>,
}

/// An agent-level failure reported from `Steppable::step`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct StepFailure(pub String);

impl StepFailure {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// An entity updated once per stepping pass.
///
/// Implementations may record observations into `facts`.  During the
/// parallel phase an agent must only mutate state owned by its own
/// partition; the partition provider is responsible for that guarantee.
pub trait Steppable: Send {
    fn step(&mut self, ctx: &StepContext, facts: &mut FactSink) -> Result<(), StepFailure>;
}

impl<S: Steppable + ?Sized> Steppable for Box<S> {
    #[inline]
    fn step(&mut self, ctx: &StepContext, facts: &mut FactSink) -> Result<(), StepFailure> {
        (**self).step(ctx, facts)
    }
}

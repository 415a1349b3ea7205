//! The partition provider seam.
//!
//! The global scheduler calls [`Partitioner::partition`] once during setup and
//! again whenever the adaptive cadence says a refresh is due.  Providers may
//! be arbitrarily expensive (graph partitioners usually are); the call always
//! happens on the simulation thread, as the last activity of its tick.

use ts_core::{AgentKind, Tick};

use crate::{PartitionAssignment, PartitionResult};

/// What a provider gets to see of the current population.
#[derive(Clone, Debug, Default)]
pub struct PopulationView {
    pub tick:           Tick,
    /// Population size per kind, indexed by `AgentKind::index()`.
    pub counts:         [usize; AgentKind::COUNT],
    /// Agents the world model knows interact across regions.
    pub boundary_hints: [Vec<usize>; AgentKind::COUNT],
    /// Network load indicator (vehicles currently on roads).
    pub load:           usize,
}

impl PopulationView {
    #[inline]
    pub fn count(&self, kind: AgentKind) -> usize {
        self.counts[kind.index()]
    }

    #[inline]
    pub fn hints(&self, kind: AgentKind) -> &[usize] {
        &self.boundary_hints[kind.index()]
    }
}

/// Pluggable partition provider.
///
/// Implementations must guarantee that no agent in one partition mutates
/// state owned by another partition while the parallel phase runs; the
/// stepping scheduler does not check this.
pub trait Partitioner: Send {
    /// Compute a fresh assignment into `partitions` partitions.
    ///
    /// The caller stamps the epoch and validates the result against the
    /// population.
    fn partition(
        &mut self,
        view:       &PopulationView,
        partitions: usize,
    ) -> PartitionResult<PartitionAssignment>;

    /// Short name used in log lines.
    fn name(&self) -> &str {
        "partitioner"
    }
}

impl<P: Partitioner + ?Sized> Partitioner for Box<P> {
    fn partition(
        &mut self,
        view:       &PopulationView,
        partitions: usize,
    ) -> PartitionResult<PartitionAssignment> {
        (**self).partition(view, partitions)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

//! The agent → partition mapping consumed by the stepping scheduler.
//!
//! Agents are addressed by their index in their kind's population.  Within a
//! partition, agents are stepped in the order listed; the boundary list is
//! stepped sequentially after every partition has joined.

use ts_core::{AgentKind, PartitionId};

use crate::{PartitionError, PartitionResult};

/// Where one agent is stepped this epoch.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Slot {
    Partition(PartitionId),
    Boundary,
    /// Named by no list.  The stepping scheduler treats it as boundary.
    Unassigned,
}

// ── KindAssignment ────────────────────────────────────────────────────────────

/// Assignment of one kind's population.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KindAssignment {
    partitions: Vec<Vec<usize>>,
    boundary:   Vec<usize>,
}

impl KindAssignment {
    pub fn new(partitions: Vec<Vec<usize>>, boundary: Vec<usize>) -> Self {
        Self { partitions, boundary }
    }

    /// Every agent in the boundary set, i.e. fully sequential stepping.
    pub fn all_boundary(len: usize) -> Self {
        Self { partitions: Vec::new(), boundary: (0..len).collect() }
    }

    #[inline]
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    pub fn partitions(&self) -> &[Vec<usize>] {
        &self.partitions
    }

    pub fn boundary(&self) -> &[usize] {
        &self.boundary
    }

    /// Number of agents named in any list.
    pub fn assigned_len(&self) -> usize {
        self.partitions.iter().map(Vec::len).sum::<usize>() + self.boundary.len()
    }

    /// Resolve every index of a population of `len` to its slot.
    ///
    /// Out-of-range entries are ignored here; [`validate`](Self::validate)
    /// reports them.
    pub fn slots(&self, len: usize) -> Vec<Slot> {
        let mut slots = vec![Slot::Unassigned; len];
        for (p, members) in self.partitions.iter().enumerate() {
            let id = PartitionId(p as u16);
            for &i in members {
                if let Some(slot) = slots.get_mut(i) {
                    *slot = Slot::Partition(id);
                }
            }
        }
        for &i in &self.boundary {
            if let Some(slot) = slots.get_mut(i) {
                *slot = Slot::Boundary;
            }
        }
        slots
    }

    /// Check that every index is `< len` and named at most once.
    pub fn validate(&self, kind: AgentKind, len: usize) -> PartitionResult<()> {
        let mut seen = vec![false; len];
        let lists = self.partitions.iter().chain(std::iter::once(&self.boundary));
        for &index in lists.flatten() {
            match seen.get_mut(index) {
                None => return Err(PartitionError::IndexOutOfRange { kind, index, len }),
                Some(true) => return Err(PartitionError::DuplicateIndex { kind, index }),
                Some(flag) => *flag = true,
            }
        }
        Ok(())
    }
}

// ── PartitionAssignment ───────────────────────────────────────────────────────

/// Assignments for every agent kind, stamped with the epoch that produced
/// them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartitionAssignment {
    epoch: u64,
    kinds: [KindAssignment; AgentKind::COUNT],
}

impl PartitionAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fully sequential assignment for the given population sizes.
    pub fn sequential(counts: [usize; AgentKind::COUNT]) -> Self {
        let mut out = Self::default();
        for kind in AgentKind::ALL {
            out.kinds[kind.index()] = KindAssignment::all_boundary(counts[kind.index()]);
        }
        out
    }

    pub fn with_kind(mut self, kind: AgentKind, assignment: KindAssignment) -> Self {
        self.kinds[kind.index()] = assignment;
        self
    }

    pub fn set(&mut self, kind: AgentKind, assignment: KindAssignment) {
        self.kinds[kind.index()] = assignment;
    }

    #[inline]
    pub fn get(&self, kind: AgentKind) -> &KindAssignment {
        &self.kinds[kind.index()]
    }

    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn set_epoch(&mut self, epoch: u64) {
        self.epoch = epoch;
    }

    /// Validate every kind against its population size.
    pub fn validate(&self, counts: [usize; AgentKind::COUNT]) -> PartitionResult<()> {
        for kind in AgentKind::ALL {
            self.get(kind).validate(kind, counts[kind.index()])?;
        }
        Ok(())
    }
}

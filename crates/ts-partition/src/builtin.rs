//! Built-in providers.
//!
//! [`BlockPartitioner`] is a stand-in for a real graph partitioner: it keeps
//! the world's boundary hints sequential and cuts everything else into
//! contiguous index blocks.  [`FixedPartitioner`] hands back one assignment
//! forever, which is what tests and hand-built scenarios want.

use ts_core::AgentKind;

use crate::{
    KindAssignment, PartitionAssignment, PartitionError, PartitionResult, Partitioner,
    PopulationView,
};

// ── BlockPartitioner ──────────────────────────────────────────────────────────

/// Contiguous-block partitioning over the non-boundary agents.
///
/// Block sizes differ by at most one; earlier blocks take the remainder.
#[derive(Clone, Debug, Default)]
pub struct BlockPartitioner;

impl BlockPartitioner {
    pub fn new() -> Self {
        Self
    }

    fn split(len: usize, hints: &[usize], partitions: usize) -> KindAssignment {
        let mut is_boundary = vec![false; len];
        for &h in hints {
            if let Some(flag) = is_boundary.get_mut(h) {
                *flag = true;
            }
        }
        let boundary: Vec<usize> = (0..len).filter(|&i| is_boundary[i]).collect();
        let interior: Vec<usize> = (0..len).filter(|&i| !is_boundary[i]).collect();

        let base = interior.len() / partitions;
        let rem = interior.len() % partitions;
        let mut blocks = Vec::with_capacity(partitions);
        let mut start = 0;
        for p in 0..partitions {
            let size = base + usize::from(p < rem);
            blocks.push(interior[start..start + size].to_vec());
            start += size;
        }
        KindAssignment::new(blocks, boundary)
    }
}

impl Partitioner for BlockPartitioner {
    fn partition(
        &mut self,
        view:       &PopulationView,
        partitions: usize,
    ) -> PartitionResult<PartitionAssignment> {
        if partitions == 0 {
            return Err(PartitionError::ZeroPartitions);
        }
        let mut out = PartitionAssignment::new();
        for kind in AgentKind::ALL {
            out.set(kind, Self::split(view.count(kind), view.hints(kind), partitions));
        }
        Ok(out)
    }

    fn name(&self) -> &str {
        "block"
    }
}

// ── FixedPartitioner ──────────────────────────────────────────────────────────

/// Always returns the same assignment.
#[derive(Clone, Debug)]
pub struct FixedPartitioner {
    assignment: PartitionAssignment,
}

impl FixedPartitioner {
    pub fn new(assignment: PartitionAssignment) -> Self {
        Self { assignment }
    }
}

impl Partitioner for FixedPartitioner {
    fn partition(
        &mut self,
        _view:       &PopulationView,
        _partitions: usize,
    ) -> PartitionResult<PartitionAssignment> {
        Ok(self.assignment.clone())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

//! Global numbering of the body-point unknowns.

use crate::body::partition::BodyPartition;
use crate::domain::partition::OwnershipRange;
use crate::error::PartitionError;

/// Globally unique, contiguous-per-process numbering of the body unknowns,
/// consistent with the body partition. Each point owns `dof_per_point`
/// consecutive indices (one per force dimension, or one for a scalar
/// potential); process blocks are prefix sums of the per-rank counts, in
/// rank order, so the map is deterministic for a fixed partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyIndexMap {
    dof_per_point: usize,
    point_base: Vec<usize>,
    ranges: Vec<OwnershipRange>,
}

impl BodyIndexMap {
    pub fn build(partition: &BodyPartition, dof_per_point: usize) -> Result<Self, PartitionError> {
        if dof_per_point == 0 {
            return Err(PartitionError::InvalidLayout(
                "Body unknowns need at least one degree of freedom per point".to_string(),
            ));
        }
        let num_points: usize = partition.points_on_process.iter().sum();
        let mut point_base = vec![0usize; num_points];
        let mut ranges = Vec::with_capacity(partition.point_indices.len());
        let mut next = 0;
        for list in &partition.point_indices {
            let start = next;
            for &l in list {
                point_base[l] = next;
                next += dof_per_point;
            }
            ranges.push(OwnershipRange::new(start, next));
        }
        Ok(Self {
            dof_per_point,
            point_base,
            ranges,
        })
    }

    pub fn dof_per_point(&self) -> usize {
        self.dof_per_point
    }

    pub fn total_unknowns(&self) -> usize {
        self.point_base.len() * self.dof_per_point
    }

    pub fn num_points(&self) -> usize {
        self.point_base.len()
    }

    /// Body-unknown range owned by `rank`.
    pub fn range(&self, rank: usize) -> OwnershipRange {
        self.ranges[rank]
    }

    /// First global index of point `l`'s unknowns.
    pub fn base(&self, l: usize) -> usize {
        self.point_base[l]
    }

    /// Global index of component `component` of point `l`.
    pub fn index(&self, l: usize, component: usize) -> usize {
        debug_assert!(component < self.dof_per_point);
        self.point_base[l] + component
    }
}

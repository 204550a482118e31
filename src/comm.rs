//! Fixed process group and the collective finalize barrier.
//!
//! Assembly is a collective operation: every rank produces its owned rows,
//! then all ranks meet in [`ProcessGroup::all_finalize`], which stands in
//! for the synchronization inherent in distributed sparse-matrix assembly.
//! Running the ranks sequentially in one address space keeps the collective
//! contract testable without a launcher; a rank that skipped the call is
//! reported instead of deadlocking the group.

use crate::error::AssemblyError;
use crate::sparse::LocalRows;
use rsparse::data::{Sprs, Trpl};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessGroup {
    size: usize,
}

impl ProcessGroup {
    pub fn new(size: usize) -> Result<Self, AssemblyError> {
        if size == 0 {
            return Err(AssemblyError::InvalidParameter(
                "Process group must have at least one rank".to_string(),
            ));
        }
        Ok(Self { size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Merges every rank's owned rows into one finished operator. All ranks
    /// must contribute exactly once and their row ranges must tile
    /// `[0, nrows)`.
    pub fn all_finalize(
        &self,
        nrows: usize,
        ncols: usize,
        locals: Vec<LocalRows>,
    ) -> Result<Sprs<f64>, AssemblyError> {
        if locals.len() != self.size {
            return Err(AssemblyError::IncompleteCollective(format!(
                "{} of {} ranks reached the assembly finalize",
                locals.len(),
                self.size
            )));
        }
        let mut seen = vec![false; self.size];
        let mut covered = 0;
        for local in &locals {
            if local.rank >= self.size || seen[local.rank] {
                return Err(AssemblyError::IncompleteCollective(format!(
                    "Rank {} contributed twice or is outside the group",
                    local.rank
                )));
            }
            seen[local.rank] = true;
            covered += local.row_range.len();
        }
        if covered != nrows {
            return Err(AssemblyError::IncompleteCollective(format!(
                "Contributed row ranges cover {} of {} rows",
                covered, nrows
            )));
        }

        let total: usize = locals.iter().map(|l| l.entries.len()).sum();
        let mut trpl = Trpl::<f64> {
            m: nrows,
            n: ncols,
            p: Vec::with_capacity(total),
            i: Vec::with_capacity(total),
            x: Vec::with_capacity(total),
        };
        for local in &locals {
            debug!(
                rank = local.rank,
                nnz = local.entries.len(),
                "merging local rows"
            );
            for &(row, col, value) in &local.entries {
                trpl.i.push(row);
                trpl.p.push(col as isize);
                trpl.x.push(value);
            }
        }
        let mut a = Sprs::new();
        a.from_trpl(&trpl);
        Ok(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::partition::OwnershipRange;
    use crate::sparse::entry;

    fn local(rank: usize, start: usize, end: usize, entries: Vec<(usize, usize, f64)>) -> LocalRows {
        LocalRows {
            rank,
            row_range: OwnershipRange::new(start, end),
            entries,
        }
    }

    #[test]
    fn test_finalize_merges_ranks() {
        let group = ProcessGroup::new(2).unwrap();
        let a = group
            .all_finalize(
                2,
                2,
                vec![
                    local(0, 0, 1, vec![(0, 0, 1.0), (0, 1, 2.0)]),
                    local(1, 1, 2, vec![(1, 1, 3.0)]),
                ],
            )
            .unwrap();
        assert_eq!(a.m, 2);
        assert_eq!(a.n, 2);
        assert_eq!(entry(&a, 0, 1), 2.0);
        assert_eq!(entry(&a, 1, 1), 3.0);
    }

    #[test]
    fn test_finalize_detects_missing_rank() {
        let group = ProcessGroup::new(2).unwrap();
        let err = group
            .all_finalize(2, 2, vec![local(0, 0, 1, vec![(0, 0, 1.0)])])
            .unwrap_err();
        assert!(matches!(err, AssemblyError::IncompleteCollective(_)));
    }

    #[test]
    fn test_finalize_detects_duplicate_rank() {
        let group = ProcessGroup::new(2).unwrap();
        let err = group
            .all_finalize(
                2,
                2,
                vec![local(0, 0, 1, vec![]), local(0, 1, 2, vec![])],
            )
            .unwrap_err();
        assert!(matches!(err, AssemblyError::IncompleteCollective(_)));
    }

    #[test]
    fn test_finalize_detects_uncovered_rows() {
        let group = ProcessGroup::new(2).unwrap();
        let err = group
            .all_finalize(
                3,
                3,
                vec![local(0, 0, 1, vec![]), local(1, 1, 2, vec![])],
            )
            .unwrap_err();
        assert!(matches!(err, AssemblyError::IncompleteCollective(_)));
    }

    #[test]
    fn test_empty_group_rejected() {
        assert!(ProcessGroup::new(0).is_err());
    }
}

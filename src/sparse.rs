//! Discover-then-allocate assembly protocol and the post-assembly transforms
//! applied to finished operators.
//!
//! Every distributed operator is built the same way: a dry-run pass records
//! per-row non-zero counts into a [`SizeEstimate`], a [`MatBuilder`] is
//! allocated from it, a fill pass inserts the values, and
//! [`MatBuilder::finish`] verifies that both passes agreed before the rank's
//! rows join the collective finalize.

use crate::domain::partition::OwnershipRange;
use crate::error::AssemblyError;
use rsparse::data::Sprs;

/// Per-owned-row counts of diagonal-block and off-diagonal-block non-zeros,
/// produced by the discovery pass and consumed by the allocation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeEstimate {
    diag: Vec<usize>,
    off: Vec<usize>,
}

impl SizeEstimate {
    pub fn new(rows: usize) -> Self {
        Self {
            diag: vec![0; rows],
            off: vec![0; rows],
        }
    }

    pub fn rows(&self) -> usize {
        self.diag.len()
    }

    /// Records one row's columns, split on the rank's owned column range.
    pub fn record(
        &mut self,
        local_row: usize,
        columns: impl IntoIterator<Item = usize>,
        owned_columns: &OwnershipRange,
    ) {
        for col in columns {
            if owned_columns.contains(col) {
                self.diag[local_row] += 1;
            } else {
                self.off[local_row] += 1;
            }
        }
    }

    pub fn row_total(&self, local_row: usize) -> usize {
        self.diag[local_row] + self.off[local_row]
    }

    pub fn total(&self) -> usize {
        self.diag.iter().sum::<usize>() + self.off.iter().sum::<usize>()
    }
}

/// One rank's finished contribution to a distributed operator.
#[derive(Debug, Clone)]
pub struct LocalRows {
    pub rank: usize,
    pub row_range: OwnershipRange,
    pub entries: Vec<(usize, usize, f64)>,
}

/// Value-insertion stage of the protocol. Storage is pre-sized from the
/// [`SizeEstimate`]; inserting more non-zeros than discovered, or finishing
/// with fewer, is an internal-consistency failure.
#[derive(Debug)]
pub struct MatBuilder {
    rank: usize,
    row_range: OwnershipRange,
    owned_columns: OwnershipRange,
    estimate: SizeEstimate,
    filled_diag: Vec<usize>,
    filled_off: Vec<usize>,
    entries: Vec<(usize, usize, f64)>,
}

impl MatBuilder {
    pub fn with_estimate(
        rank: usize,
        row_range: OwnershipRange,
        owned_columns: OwnershipRange,
        estimate: SizeEstimate,
    ) -> Result<Self, AssemblyError> {
        if estimate.rows() != row_range.len() {
            return Err(AssemblyError::Precondition(format!(
                "Rank {}: size estimate covers {} rows but the rank owns {}",
                rank,
                estimate.rows(),
                row_range.len()
            )));
        }
        let rows = estimate.rows();
        let capacity = estimate.total();
        Ok(Self {
            rank,
            row_range,
            owned_columns,
            estimate,
            filled_diag: vec![0; rows],
            filled_off: vec![0; rows],
            entries: Vec::with_capacity(capacity),
        })
    }

    pub fn insert(&mut self, row: usize, col: usize, value: f64) -> Result<(), AssemblyError> {
        if !self.row_range.contains(row) {
            return Err(AssemblyError::Precondition(format!(
                "Rank {}: insertion into row {} outside owned range [{}, {})",
                self.rank, row, self.row_range.start, self.row_range.end
            )));
        }
        let local = row - self.row_range.start;
        let (filled, budget) = if self.owned_columns.contains(col) {
            (&mut self.filled_diag[local], self.estimate.diag[local])
        } else {
            (&mut self.filled_off[local], self.estimate.off[local])
        };
        if *filled == budget {
            return Err(AssemblyError::SizeMismatch(format!(
                "Rank {}: row {} exceeds its discovered non-zero count ({})",
                self.rank, row, budget
            )));
        }
        *filled += 1;
        self.entries.push((row, col, value));
        Ok(())
    }

    /// Inserts one stencil row; columns that resolved to no unknown (domain
    /// boundary neighbors) are dropped.
    pub fn insert_row(
        &mut self,
        row: usize,
        columns: &[Option<usize>],
        values: &[f64],
    ) -> Result<(), AssemblyError> {
        for (col, &value) in columns.iter().zip(values) {
            if let Some(col) = col {
                self.insert(row, *col, value)?;
            }
        }
        Ok(())
    }

    pub fn finish(self) -> Result<LocalRows, AssemblyError> {
        for local in 0..self.estimate.rows() {
            if self.filled_diag[local] != self.estimate.diag[local]
                || self.filled_off[local] != self.estimate.off[local]
            {
                return Err(AssemblyError::SizeMismatch(format!(
                    "Rank {}: row {} filled {}+{} non-zeros but the discovery pass counted {}+{}",
                    self.rank,
                    self.row_range.start + local,
                    self.filled_diag[local],
                    self.filled_off[local],
                    self.estimate.diag[local],
                    self.estimate.off[local],
                )));
            }
        }
        Ok(LocalRows {
            rank: self.rank,
            row_range: self.row_range,
            entries: self.entries,
        })
    }
}

/// Multiplies every stored entry by `s` (MatScale).
pub fn scale(a: &mut Sprs<f64>, s: f64) {
    for x in &mut a.x {
        *x *= s;
    }
}

/// Adds `s` to every diagonal entry (MatShift). The diagonal must be
/// structurally present in every column.
pub fn shift_diagonal(a: &mut Sprs<f64>, s: f64) -> Result<(), AssemblyError> {
    for j in 0..a.n {
        let start = a.p[j] as usize;
        let end = a.p[j + 1] as usize;
        let mut found = false;
        for idx in start..end {
            if a.i[idx] == j {
                a.x[idx] += s;
                found = true;
                break;
            }
        }
        if !found {
            return Err(AssemblyError::SizeMismatch(format!(
                "Diagonal entry ({j}, {j}) is structurally absent"
            )));
        }
    }
    Ok(())
}

/// Scales rows by `left` and columns by `right` (MatDiagonalScale).
pub fn diagonal_scale(a: &mut Sprs<f64>, left: &[f64], right: &[f64]) -> Result<(), AssemblyError> {
    if left.len() != a.m || right.len() != a.n {
        return Err(AssemblyError::Precondition(format!(
            "Diagonal scaling vectors have lengths {} and {}, matrix is {}x{}",
            left.len(),
            right.len(),
            a.m,
            a.n
        )));
    }
    for j in 0..a.n {
        let start = a.p[j] as usize;
        let end = a.p[j + 1] as usize;
        for idx in start..end {
            a.x[idx] *= left[a.i[idx]] * right[j];
        }
    }
    Ok(())
}

/// Value of entry (row, col), treating structural zeros as 0.0.
pub fn entry(a: &Sprs<f64>, row: usize, col: usize) -> f64 {
    let start = a.p[col] as usize;
    let end = a.p[col + 1] as usize;
    (start..end)
        .filter(|&idx| a.i[idx] == row)
        .map(|idx| a.x[idx])
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rsparse::data::Trpl;

    fn range(start: usize, end: usize) -> OwnershipRange {
        OwnershipRange::new(start, end)
    }

    fn small_matrix() -> Sprs<f64> {
        // [[2, 1], [0, 3]]
        let trpl = Trpl::<f64> {
            m: 2,
            n: 2,
            p: vec![0, 1, 1],
            i: vec![0, 0, 1],
            x: vec![2.0, 1.0, 3.0],
        };
        let mut a = Sprs::new();
        a.from_trpl(&trpl);
        a
    }

    #[test]
    fn test_size_estimate_diag_off_split() {
        let mut est = SizeEstimate::new(2);
        est.record(0, [0, 1, 5], &range(0, 2));
        est.record(1, [1, 6], &range(0, 2));
        assert_eq!(est.row_total(0), 3);
        assert_eq!(est.diag, vec![2, 1]);
        assert_eq!(est.off, vec![1, 1]);
        assert_eq!(est.total(), 5);
    }

    #[test]
    fn test_builder_matches_estimate() {
        let mut est = SizeEstimate::new(2);
        est.record(0, [0, 1], &range(0, 2));
        est.record(1, [1, 3], &range(0, 2));
        let mut builder = MatBuilder::with_estimate(0, range(0, 2), range(0, 2), est).unwrap();
        builder.insert(0, 0, 1.0).unwrap();
        builder.insert(0, 1, 2.0).unwrap();
        builder.insert(1, 1, 3.0).unwrap();
        builder.insert(1, 3, 4.0).unwrap();
        let local = builder.finish().unwrap();
        assert_eq!(local.entries.len(), 4);
    }

    #[test]
    fn test_builder_rejects_overflow() {
        let mut est = SizeEstimate::new(1);
        est.record(0, [0], &range(0, 1));
        let mut builder = MatBuilder::with_estimate(0, range(0, 1), range(0, 1), est).unwrap();
        builder.insert(0, 0, 1.0).unwrap();
        let err = builder.insert(0, 0, 1.0).unwrap_err();
        assert!(matches!(err, AssemblyError::SizeMismatch(_)));
    }

    #[test]
    fn test_builder_rejects_underfill() {
        let mut est = SizeEstimate::new(1);
        est.record(0, [0, 1], &range(0, 1));
        let builder = MatBuilder::with_estimate(0, range(0, 1), range(0, 1), est).unwrap();
        assert!(matches!(
            builder.finish(),
            Err(AssemblyError::SizeMismatch(_))
        ));
    }

    #[test]
    fn test_builder_rejects_foreign_row() {
        let est = SizeEstimate::new(1);
        let mut builder = MatBuilder::with_estimate(0, range(3, 4), range(0, 1), est).unwrap();
        assert!(matches!(
            builder.insert(0, 0, 1.0),
            Err(AssemblyError::Precondition(_))
        ));
    }

    #[test]
    fn test_scale_shift_negate_order() {
        let mut a = small_matrix();
        scale(&mut a, 2.0);
        shift_diagonal(&mut a, -1.0).unwrap();
        scale(&mut a, -1.0);
        assert_relative_eq!(entry(&a, 0, 0), -3.0, epsilon = 1e-12);
        assert_relative_eq!(entry(&a, 0, 1), -2.0, epsilon = 1e-12);
        assert_relative_eq!(entry(&a, 1, 1), -5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_diagonal_scale() {
        let mut a = small_matrix();
        diagonal_scale(&mut a, &[2.0, 3.0], &[1.0, 10.0]).unwrap();
        assert_relative_eq!(entry(&a, 0, 0), 4.0, epsilon = 1e-12);
        assert_relative_eq!(entry(&a, 0, 1), 20.0, epsilon = 1e-12);
        assert_relative_eq!(entry(&a, 1, 1), 90.0, epsilon = 1e-12);
        assert!(diagonal_scale(&mut a, &[1.0], &[1.0, 1.0]).is_err());
    }

    #[test]
    fn test_shift_requires_structural_diagonal() {
        // [[0, 1], [0, 0]] has no diagonal in column 0
        let trpl = Trpl::<f64> {
            m: 2,
            n: 2,
            p: vec![1],
            i: vec![0],
            x: vec![1.0],
        };
        let mut a = Sprs::new();
        a.from_trpl(&trpl);
        assert!(shift_diagonal(&mut a, 1.0).is_err());
    }
}

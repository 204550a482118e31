//! Second-order centered finite-difference Laplacian rows on a non-uniform
//! grid. The flat ordering (center, x-, x+, y-, y+[, z-, z+]) pairs with the
//! neighbor coordinates positionally, so both sides live in this module.

/// Backward and forward spacing of a node along one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisSpacing {
    pub minus: f64,
    pub plus: f64,
}

/// One Laplacian row: the center coefficient and a (minus, plus) pair per
/// axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StencilRow<const D: usize> {
    pub center: f64,
    pub neighbors: [[f64; 2]; D],
}

impl<const D: usize> StencilRow<D> {
    pub const fn width() -> usize {
        2 * D + 1
    }

    /// Coefficients in flat order: center, then (minus, plus) per axis.
    pub fn values(&self) -> Vec<f64> {
        let mut values = Vec::with_capacity(Self::width());
        values.push(self.center);
        for axis in self.neighbors {
            values.push(axis[0]);
            values.push(axis[1]);
        }
        values
    }
}

/// Laplacian row coefficients for a node with the given spacings.
///
/// Per axis with backward spacing `m` and forward spacing `p`: the minus
/// neighbor gets `2 / (m (m + p))`, the plus neighbor `2 / (p (m + p))`, and
/// the axis contributes `-2 / (m p)` to the center.
pub fn laplacian_row<const D: usize>(spacing: [AxisSpacing; D]) -> StencilRow<D> {
    let mut center = 0.0;
    let neighbors = std::array::from_fn(|a| {
        let AxisSpacing { minus, plus } = spacing[a];
        center += -2.0 / minus / plus;
        [
            2.0 / minus / (minus + plus),
            2.0 / plus / (minus + plus),
        ]
    });
    StencilRow { center, neighbors }
}

/// Neighbor coordinates of `coord` in the same flat order as
/// [`StencilRow::values`]; entries may be negative or off-grid and are
/// resolved (or dropped) by the global index lookup.
pub fn neighbor_coords<const D: usize>(coord: [usize; D]) -> Vec<[isize; D]> {
    let signed: [isize; D] = std::array::from_fn(|a| coord[a] as isize);
    let mut coords = Vec::with_capacity(2 * D + 1);
    coords.push(signed);
    for a in 0..D {
        let mut minus = signed;
        minus[a] -= 1;
        coords.push(minus);
        let mut plus = signed;
        plus[a] += 1;
        coords.push(plus);
    }
    coords
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn uniform<const D: usize>(h: f64) -> [AxisSpacing; D] {
        [AxisSpacing { minus: h, plus: h }; D]
    }

    #[test]
    fn test_uniform_2d_row() {
        let h = 0.25;
        let row = laplacian_row::<2>(uniform(h));
        assert_relative_eq!(row.center, -4.0 / (h * h), epsilon = 1e-12);
        for axis in row.neighbors {
            assert_relative_eq!(axis[0], 1.0 / (h * h), epsilon = 1e-12);
            assert_relative_eq!(axis[1], 1.0 / (h * h), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_uniform_3d_row() {
        let h = 0.5;
        let row = laplacian_row::<3>(uniform(h));
        assert_relative_eq!(row.center, -6.0 / (h * h), epsilon = 1e-12);
        for axis in row.neighbors {
            assert_relative_eq!(axis[0], 1.0 / (h * h), epsilon = 1e-12);
            assert_relative_eq!(axis[1], 1.0 / (h * h), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_uniform_rows_sum_to_zero() {
        for h in [0.1, 1.0, 3.0] {
            let row2 = laplacian_row::<2>(uniform(h));
            assert_relative_eq!(row2.values().iter().sum::<f64>(), 0.0, epsilon = 1e-10);
            let row3 = laplacian_row::<3>(uniform(h));
            assert_relative_eq!(row3.values().iter().sum::<f64>(), 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_stretched_spacing() {
        // matches 2 / (h- (h- + h+)) and friends for h- = 1, h+ = 2
        let row = laplacian_row::<2>([
            AxisSpacing {
                minus: 1.0,
                plus: 2.0,
            },
            AxisSpacing {
                minus: 1.0,
                plus: 1.0,
            },
        ]);
        assert_relative_eq!(row.neighbors[0][0], 2.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(row.neighbors[0][1], 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(row.center, -1.0 - 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_flat_ordering() {
        let coords = neighbor_coords([2, 3]);
        assert_eq!(
            coords,
            vec![[2, 3], [1, 3], [3, 3], [2, 2], [2, 4]]
        );
        assert_eq!(coords.len(), StencilRow::<2>::width());
        assert_eq!(neighbor_coords([1, 1, 1]).len(), StencilRow::<3>::width());
    }
}

use crate::error::MeshError;

/// Structured Cartesian mesh of a rectangular domain, staggered in the usual
/// marker-and-cell arrangement.
///
/// ```text
///     →       →       →       →
///     |       |       |       |
/// ↑ - + - ↑ - + - ↑ - + - ↑ - + - ↑
///     |       |       |       |
///     →   •   →   •   →   •   →
///     |       |       |       |
/// ↑ - + - ↑ - + - ↑ - + - ↑ - + - ↑
///     |       |       |       |
///     →   •   →   •   →   •   →
///     |       |       |       |
/// ↑ - + - ↑ - + - ↑ - + - ↑ - + - ↑
///     |       |       |       |
///     →       →       →       →
/// ```
///
/// Pressure unknowns (•) live at cell centers; the velocity component along
/// axis `c` lives on the faces normal to that axis. Only the vertex (cell
/// boundary) coordinates are stored; every staggered coordinate array is
/// derived from them.
#[derive(Debug, Clone, PartialEq)]
pub struct CartesianMesh<const D: usize> {
    vertices: [Vec<f64>; D],
    centers: [Vec<f64>; D],
    // flux_coords[c][a]: coordinates of the component-c grid along axis a,
    // bracketed by the two wall coordinates (length = interior count + 2)
    flux_coords: Vec<[Vec<f64>; D]>,
}

impl<const D: usize> CartesianMesh<D> {
    pub fn new(vertices: [Vec<f64>; D]) -> Result<Self, MeshError> {
        if D != 2 && D != 3 {
            return Err(MeshError::UnsupportedDimension(D));
        }
        for (axis, coords) in vertices.iter().enumerate() {
            if coords.len() < 3 {
                return Err(MeshError::InvalidAxis(format!(
                    "Axis {} needs at least 2 cells, got {}",
                    axis,
                    coords.len().saturating_sub(1)
                )));
            }
            if coords.windows(2).any(|w| w[1] <= w[0]) {
                return Err(MeshError::InvalidAxis(format!(
                    "Axis {} coordinates must be strictly increasing",
                    axis
                )));
            }
        }

        let centers: [Vec<f64>; D] = std::array::from_fn(|a| {
            vertices[a]
                .windows(2)
                .map(|w| 0.5 * (w[0] + w[1]))
                .collect()
        });

        let flux_coords: Vec<[Vec<f64>; D]> = (0..D)
            .map(|c| {
                std::array::from_fn(|a| {
                    if a == c {
                        // faces normal to the component axis sit on the vertices
                        vertices[a].clone()
                    } else {
                        // cell centers, bracketed by the wall coordinates
                        let n = vertices[a].len();
                        let mut coords = Vec::with_capacity(n + 1);
                        coords.push(vertices[a][0]);
                        coords.extend_from_slice(&centers[a]);
                        coords.push(vertices[a][n - 1]);
                        coords
                    }
                })
            })
            .collect();

        Ok(Self {
            vertices,
            centers,
            flux_coords,
        })
    }

    /// Uniform mesh with `cells[a]` cells spanning `[lower[a], upper[a]]`.
    pub fn uniform(cells: [usize; D], lower: [f64; D], upper: [f64; D]) -> Result<Self, MeshError> {
        let vertices: [Vec<f64>; D] = std::array::from_fn(|a| {
            let n = cells[a];
            let width = if n > 0 {
                (upper[a] - lower[a]) / n as f64
            } else {
                0.0
            };
            (0..=n).map(|i| lower[a] + i as f64 * width).collect()
        });
        Self::new(vertices)
    }

    pub fn cells(&self, axis: usize) -> usize {
        self.vertices[axis].len() - 1
    }

    pub fn vertices(&self, axis: usize) -> &[f64] {
        &self.vertices[axis]
    }

    pub fn centers(&self, axis: usize) -> &[f64] {
        &self.centers[axis]
    }

    /// Width of pressure cell `i` along `axis`.
    pub fn cell_width(&self, axis: usize, i: usize) -> f64 {
        self.vertices[axis][i + 1] - self.vertices[axis][i]
    }

    /// Coordinates of the component-`c` grid along `axis`, including the two
    /// boundary entries. Interior node `i` sits at index `i + 1`, so its
    /// backward and forward spacings are the two consecutive differences
    /// around that index.
    pub fn flux_coords(&self, component: usize, axis: usize) -> &[f64] {
        &self.flux_coords[component][axis]
    }

    /// Position of interior node `i` of component `c` along `axis`.
    pub fn flux_position(&self, component: usize, axis: usize, i: usize) -> f64 {
        self.flux_coords[component][axis][i + 1]
    }

    /// Backward and forward spacings of interior node `i` of component `c`
    /// along `axis`.
    pub fn flux_spacing(&self, component: usize, axis: usize, i: usize) -> (f64, f64) {
        let coords = &self.flux_coords[component][axis];
        (coords[i + 1] - coords[i], coords[i + 2] - coords[i + 1])
    }

    /// Interior node counts of the component-`c` velocity grid: domain
    /// boundary faces carry boundary conditions, not unknowns, so the grid
    /// loses one node along its own axis.
    pub fn flux_interior(&self, component: usize) -> [usize; D] {
        std::array::from_fn(|a| {
            if a == component {
                self.cells(a) - 1
            } else {
                self.cells(a)
            }
        })
    }

    pub fn pressure_interior(&self) -> [usize; D] {
        std::array::from_fn(|a| self.cells(a))
    }

    /// Total number of velocity unknowns across all components.
    pub fn flux_unknowns(&self) -> usize {
        (0..D)
            .map(|c| self.flux_interior(c).iter().product::<usize>())
            .sum()
    }

    pub fn pressure_unknowns(&self) -> usize {
        self.pressure_interior().iter().product()
    }
}

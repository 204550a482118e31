//! Spread and interpolation operators coupling the Lagrangian body points to
//! the Eulerian flux grid through a discrete regularization kernel.

use crate::body::indexing::BodyIndexMap;
use crate::body::partition::BodyPartition;
use crate::body::points::BodyPoints;
use crate::comm::ProcessGroup;
use crate::domain::mesh::CartesianMesh;
use crate::domain::partition::{box_coords, GridPartition};
use crate::error::AssemblyError;
use crate::sparse::{MatBuilder, SizeEstimate};
use rsparse::data::Sprs;
use tracing::{info, info_span};

/// Discrete delta function with finite support, in grid-cell units. The
/// exact shape is a numerical-method parameter, not part of the assembly
/// contract.
pub trait RegularizationKernel {
    /// Half-width of the support, in cells.
    fn support(&self) -> f64;

    /// Kernel value at a normalized offset `r` (cells).
    fn phi(&self, r: f64) -> f64;
}

/// Three-point discrete delta function of Roma, Peskin and Berger; the
/// kernel the reference solver uses.
#[derive(Debug, Clone, Copy, Default)]
pub struct RomaKernel;

impl RegularizationKernel for RomaKernel {
    fn support(&self) -> f64 {
        1.5
    }

    fn phi(&self, r: f64) -> f64 {
        let r = r.abs();
        if r <= 0.5 {
            (1.0 + (1.0 - 3.0 * r * r).max(0.0).sqrt()) / 3.0
        } else if r <= 1.5 {
            let t = 1.0 - r;
            (5.0 - 3.0 * r - (1.0 - 3.0 * t * t).max(0.0).sqrt()) / 6.0
        } else {
            0.0
        }
    }
}

/// Builds the rectangular coupling operators for one body partition. All
/// three products follow the same discover-then-allocate protocol as the
/// implicit operator, with their own per-row count arrays.
#[derive(Debug)]
pub struct CouplingAssembler<'a, const D: usize, K: RegularizationKernel> {
    mesh: &'a CartesianMesh<D>,
    partition: &'a GridPartition<D>,
    points: &'a BodyPoints<D>,
    bodies: &'a BodyPartition,
    forces: &'a BodyIndexMap,
    kernel: &'a K,
}

impl<'a, const D: usize, K: RegularizationKernel> CouplingAssembler<'a, D, K> {
    pub fn new(
        mesh: &'a CartesianMesh<D>,
        partition: &'a GridPartition<D>,
        points: &'a BodyPoints<D>,
        bodies: &'a BodyPartition,
        forces: &'a BodyIndexMap,
        kernel: &'a K,
    ) -> Result<Self, AssemblyError> {
        if forces.dof_per_point() != D {
            return Err(AssemblyError::Precondition(format!(
                "Force index map carries {} unknowns per point, expected {}",
                forces.dof_per_point(),
                D
            )));
        }
        if forces.num_points() != points.len() {
            return Err(AssemblyError::Precondition(format!(
                "Force index map covers {} points, the body has {}",
                forces.num_points(),
                points.len()
            )));
        }
        if bodies.point_indices.len() != partition.num_ranks() {
            return Err(AssemblyError::Precondition(
                "Body partition and grid partition disagree on the process count".to_string(),
            ));
        }
        Ok(Self {
            mesh,
            partition,
            points,
            bodies,
            forces,
            kernel,
        })
    }

    /// Kernel weight of a flux node against a body point, or None when the
    /// point is outside the node's support box. Both assembly passes use
    /// this one predicate, so their counts agree by construction.
    fn flux_weight(&self, component: usize, coord: [usize; D], x: &[f64; D]) -> Option<f64> {
        let mut weight = 1.0;
        for a in 0..D {
            let pos = self.mesh.flux_position(component, a, coord[a]);
            let (minus, plus) = self.mesh.flux_spacing(component, a, coord[a]);
            let h = 0.5 * (minus + plus);
            let r = (pos - x[a]) / h;
            if r.abs() >= self.kernel.support() {
                return None;
            }
            weight *= self.kernel.phi(r) / h;
        }
        Some(weight)
    }

    fn pressure_weight(&self, coord: [usize; D], x: &[f64; D]) -> Option<f64> {
        let mut weight = 1.0;
        for a in 0..D {
            let pos = self.mesh.centers(a)[coord[a]];
            let h = self.mesh.cell_width(a, coord[a]);
            let r = (pos - x[a]) / h;
            if r.abs() >= self.kernel.support() {
                return None;
            }
            weight *= self.kernel.phi(r) / h;
        }
        Some(weight)
    }

    /// Non-zeros of one flux row: every body force unknown whose point lies
    /// in the node's support.
    fn spread_row(&self, component: usize, coord: [usize; D]) -> Vec<(usize, f64)> {
        let mut row = Vec::new();
        for (l, x) in self.points.iter().enumerate() {
            if let Some(weight) = self.flux_weight(component, coord, x) {
                row.push((self.forces.index(l, component), weight));
            }
        }
        row
    }

    /// Non-zeros of one body row: the flux nodes of `component` inside the
    /// point's support box, located by an axis-wise coordinate scan.
    fn interpolate_row(&self, l: usize, component: usize) -> Vec<(usize, f64)> {
        let x = self.points.position(l);
        let dims = self.mesh.flux_interior(component);
        let candidates: [Vec<usize>; D] = std::array::from_fn(|a| {
            (0..dims[a])
                .filter(|&i| {
                    let pos = self.mesh.flux_position(component, a, i);
                    let (minus, plus) = self.mesh.flux_spacing(component, a, i);
                    let h = 0.5 * (minus + plus);
                    ((pos - x[a]) / h).abs() < self.kernel.support()
                })
                .collect()
        });
        let lens: [usize; D] = std::array::from_fn(|a| candidates[a].len());
        let mut row = Vec::new();
        for sel in box_coords([0; D], lens) {
            let coord: [usize; D] = std::array::from_fn(|a| candidates[a][sel[a]]);
            if let Some(weight) = self.flux_weight(component, coord, &x) {
                let signed: [isize; D] = std::array::from_fn(|a| coord[a] as isize);
                if let Some(col) = self.partition.flux_index(component, signed) {
                    row.push((col, weight));
                }
            }
        }
        row
    }

    fn scalar_row(&self, coord: [usize; D], scalars: &BodyIndexMap) -> Vec<(usize, f64)> {
        let mut row = Vec::new();
        for (l, x) in self.points.iter().enumerate() {
            if let Some(weight) = self.pressure_weight(coord, x) {
                row.push((scalars.index(l, 0), weight));
            }
        }
        row
    }

    /// Spread operator: flux rows, body-force columns. Maps a force at a
    /// body point onto the flux nodes in its support.
    pub fn assemble_spread(&self, group: &ProcessGroup) -> Result<Sprs<f64>, AssemblyError> {
        let _span = info_span!("assemble_spread", ranks = group.size()).entered();
        self.check_group(group)?;

        let mut locals = Vec::with_capacity(group.size());
        for rank in 0..group.size() {
            let range = self.partition.flux_range(rank);
            let owned_columns = self.forces.range(rank);

            let mut estimate = SizeEstimate::new(range.len());
            let mut local_row = 0;
            for component in 0..D {
                let (start, count) = self.partition.owned_flux_box(rank, component);
                for coord in box_coords(start, count) {
                    let row = self.spread_row(component, coord);
                    estimate.record(local_row, row.iter().map(|&(col, _)| col), &owned_columns);
                    local_row += 1;
                }
            }

            let mut builder = MatBuilder::with_estimate(rank, range, owned_columns, estimate)?;
            for component in 0..D {
                let (start, count) = self.partition.owned_flux_box(rank, component);
                for coord in box_coords(start, count) {
                    let signed: [isize; D] = std::array::from_fn(|a| coord[a] as isize);
                    let row_index = self.partition.flux_index(component, signed).ok_or_else(|| {
                        AssemblyError::Precondition(format!(
                            "Owned node {:?} of component {} has no global index",
                            coord, component
                        ))
                    })?;
                    for (col, weight) in self.spread_row(component, coord) {
                        builder.insert(row_index, col, weight)?;
                    }
                }
            }
            locals.push(builder.finish()?);
        }

        let a = group.all_finalize(
            self.partition.flux_unknowns(),
            self.forces.total_unknowns(),
            locals,
        )?;
        info!(rows = a.m, cols = a.n, nnz = a.x.len(), "spread operator assembled");
        Ok(a)
    }

    /// Interpolation operator: body-force rows, flux columns; the
    /// transpose arrangement of the spread operator.
    pub fn assemble_interpolate(&self, group: &ProcessGroup) -> Result<Sprs<f64>, AssemblyError> {
        let _span = info_span!("assemble_interpolate", ranks = group.size()).entered();
        self.check_group(group)?;

        let mut locals = Vec::with_capacity(group.size());
        for rank in 0..group.size() {
            let range = self.forces.range(rank);
            let owned_columns = self.partition.flux_range(rank);

            let mut estimate = SizeEstimate::new(range.len());
            let mut local_row = 0;
            for &l in &self.bodies.point_indices[rank] {
                for component in 0..D {
                    let row = self.interpolate_row(l, component);
                    estimate.record(local_row, row.iter().map(|&(col, _)| col), &owned_columns);
                    local_row += 1;
                }
            }

            let mut builder = MatBuilder::with_estimate(rank, range, owned_columns, estimate)?;
            for &l in &self.bodies.point_indices[rank] {
                for component in 0..D {
                    let row_index = self.forces.index(l, component);
                    for (col, weight) in self.interpolate_row(l, component) {
                        builder.insert(row_index, col, weight)?;
                    }
                }
            }
            locals.push(builder.finish()?);
        }

        let a = group.all_finalize(
            self.forces.total_unknowns(),
            self.partition.flux_unknowns(),
            locals,
        )?;
        info!(rows = a.m, cols = a.n, nnz = a.x.len(), "interpolation operator assembled");
        Ok(a)
    }

    /// Companion scalar operator: pressure rows, one column per body point,
    /// sized by the per-process pressure-node counts of the body partition.
    pub fn assemble_scalar(
        &self,
        scalars: &BodyIndexMap,
        group: &ProcessGroup,
    ) -> Result<Sprs<f64>, AssemblyError> {
        let _span = info_span!("assemble_scalar_coupling", ranks = group.size()).entered();
        self.check_group(group)?;
        if scalars.dof_per_point() != 1 {
            return Err(AssemblyError::Precondition(format!(
                "Scalar index map carries {} unknowns per point, expected 1",
                scalars.dof_per_point()
            )));
        }
        if scalars.num_points() != self.points.len() {
            return Err(AssemblyError::Precondition(format!(
                "Scalar index map covers {} points, the body has {}",
                scalars.num_points(),
                self.points.len()
            )));
        }

        let mut locals = Vec::with_capacity(group.size());
        for rank in 0..group.size() {
            let range = self.partition.pressure_range(rank);
            if range.len() != self.bodies.pressure_nodes_on_process[rank] {
                return Err(AssemblyError::Precondition(format!(
                    "Rank {}: body partition recorded {} pressure nodes, the grid owns {}",
                    rank,
                    self.bodies.pressure_nodes_on_process[rank],
                    range.len()
                )));
            }
            let owned_columns = scalars.range(rank);

            let (start, count) = self.partition.owned_pressure_box(rank);
            let mut estimate = SizeEstimate::new(range.len());
            for (local_row, coord) in box_coords(start, count).into_iter().enumerate() {
                let row = self.scalar_row(coord, scalars);
                estimate.record(local_row, row.iter().map(|&(col, _)| col), &owned_columns);
            }

            let mut builder = MatBuilder::with_estimate(rank, range, owned_columns, estimate)?;
            for coord in box_coords(start, count) {
                let signed: [isize; D] = std::array::from_fn(|a| coord[a] as isize);
                let row_index = self.partition.pressure_index(signed).ok_or_else(|| {
                    AssemblyError::Precondition(format!(
                        "Owned pressure node {:?} has no global index",
                        coord
                    ))
                })?;
                for (col, weight) in self.scalar_row(coord, scalars) {
                    builder.insert(row_index, col, weight)?;
                }
            }
            locals.push(builder.finish()?);
        }

        let a = group.all_finalize(
            self.partition.pressure_unknowns(),
            scalars.total_unknowns(),
            locals,
        )?;
        info!(rows = a.m, cols = a.n, nnz = a.x.len(), "scalar coupling operator assembled");
        Ok(a)
    }

    fn check_group(&self, group: &ProcessGroup) -> Result<(), AssemblyError> {
        if group.size() != self.partition.num_ranks() {
            return Err(AssemblyError::Precondition(format!(
                "Process group has {} ranks but the grid partition expects {}",
                group.size(),
                self.partition.num_ranks()
            )));
        }
        Ok(())
    }
}

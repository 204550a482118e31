//! Assembly of the implicit semi-discrete momentum operator
//! `-(M_hat) (nu alpha L - I / dt) (R^-1)` over the combined velocity
//! unknowns.

use crate::domain::mesh::CartesianMesh;
use crate::domain::partition::{box_coords, GridPartition};
use crate::error::AssemblyError;
use crate::comm::ProcessGroup;
use crate::operators::stencil::{laplacian_row, neighbor_coords, AxisSpacing};
use crate::params::SimulationParameters;
use crate::sparse::{self, LocalRows, MatBuilder, SizeEstimate};
use nalgebra::DVector;
use rsparse::data::Sprs;
use tracing::{info, info_span};

/// Builds the square operator with the time-derivative and viscous-diffusion
/// contributions of every velocity component, diagonally scaled by the mass
/// matrix on the left and the inverse metric on the right.
#[derive(Debug)]
pub struct ImplicitAssembler<'a, const D: usize> {
    mesh: &'a CartesianMesh<D>,
    partition: &'a GridPartition<D>,
    params: SimulationParameters,
    mass: &'a DVector<f64>,
    inv_metric: &'a DVector<f64>,
}

impl<'a, const D: usize> ImplicitAssembler<'a, D> {
    pub fn new(
        mesh: &'a CartesianMesh<D>,
        partition: &'a GridPartition<D>,
        params: SimulationParameters,
        mass: &'a DVector<f64>,
        inv_metric: &'a DVector<f64>,
    ) -> Result<Self, AssemblyError> {
        params.validate()?;
        let n = partition.flux_unknowns();
        if mass.len() != n || inv_metric.len() != n {
            return Err(AssemblyError::Precondition(format!(
                "Diagonal scaling vectors have lengths {} and {}, but the flux space has {} unknowns",
                mass.len(),
                inv_metric.len(),
                n
            )));
        }
        Ok(Self {
            mesh,
            partition,
            params,
            mass,
            inv_metric,
        })
    }

    /// Stencil columns of one node, in flat order; domain-boundary neighbors
    /// resolve to None and are dropped on insertion.
    fn row_columns(&self, component: usize, coord: [usize; D]) -> Vec<Option<usize>> {
        neighbor_coords(coord)
            .into_iter()
            .map(|c| self.partition.flux_index(component, c))
            .collect()
    }

    fn row_values(&self, component: usize, coord: [usize; D]) -> Vec<f64> {
        let spacing: [AxisSpacing; D] = std::array::from_fn(|a| {
            let (minus, plus) = self.mesh.flux_spacing(component, a, coord[a]);
            AxisSpacing { minus, plus }
        });
        laplacian_row(spacing).values()
    }

    /// Discovery and fill passes for one rank's owned rows. Neighbor indices
    /// are recomputed in the fill pass rather than cached; memory stays
    /// bounded by the non-zero storage itself.
    pub fn assemble_local(&self, rank: usize) -> Result<LocalRows, AssemblyError> {
        let range = self.partition.flux_range(rank);

        let mut estimate = SizeEstimate::new(range.len());
        let mut local_row = 0;
        for component in 0..D {
            let (start, count) = self.partition.owned_flux_box(rank, component);
            for coord in box_coords(start, count) {
                let columns = self.row_columns(component, coord);
                estimate.record(local_row, columns.into_iter().flatten(), &range);
                local_row += 1;
            }
        }

        let mut builder = MatBuilder::with_estimate(rank, range, range, estimate)?;
        for component in 0..D {
            let (start, count) = self.partition.owned_flux_box(rank, component);
            for coord in box_coords(start, count) {
                let columns = self.row_columns(component, coord);
                let values = self.row_values(component, coord);
                let row = columns[0].ok_or_else(|| {
                    AssemblyError::Precondition(format!(
                        "Owned node {:?} of component {} has no global index",
                        coord, component
                    ))
                })?;
                builder.insert_row(row, &columns, &values)?;
            }
        }
        builder.finish()
    }

    /// Collective assembly over the whole group, followed by the
    /// post-assembly transform: scale by `nu alpha`, shift the diagonal by
    /// `-1/dt`, negate, then apply the diagonal mass and inverse-metric
    /// scalings. The sign flip has to precede the diagonal scaling; the
    /// outer projection algorithm expects exactly this convention.
    pub fn assemble(&self, group: &ProcessGroup) -> Result<Sprs<f64>, AssemblyError> {
        let _span = info_span!("assemble_implicit", ranks = group.size()).entered();
        if group.size() != self.partition.num_ranks() {
            return Err(AssemblyError::Precondition(format!(
                "Process group has {} ranks but the grid partition expects {}",
                group.size(),
                self.partition.num_ranks()
            )));
        }

        let locals = (0..group.size())
            .map(|rank| self.assemble_local(rank))
            .collect::<Result<Vec<_>, _>>()?;

        let n = self.partition.flux_unknowns();
        let mut a = group.all_finalize(n, n, locals)?;

        sparse::scale(&mut a, self.params.nu * self.params.alpha_implicit);
        sparse::shift_diagonal(&mut a, -1.0 / self.params.dt)?;
        sparse::scale(&mut a, -1.0);
        sparse::diagonal_scale(&mut a, self.mass.as_slice(), self.inv_metric.as_slice())?;

        info!(rows = a.m, nnz = a.x.len(), "implicit operator assembled");
        Ok(a)
    }
}

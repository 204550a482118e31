use crate::domain::mesh::CartesianMesh;
use crate::error::PartitionError;

/// Contiguous half-open interval of global indices owned by one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnershipRange {
    pub start: usize,
    pub end: usize,
}

impl OwnershipRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Iterates a rectangular index box in x-fastest order.
pub fn box_coords<const D: usize>(start: [usize; D], count: [usize; D]) -> Vec<[usize; D]> {
    let total: usize = count.iter().product();
    let mut coords = Vec::with_capacity(total);
    if total == 0 {
        return coords;
    }
    let mut current = start;
    loop {
        coords.push(current);
        let mut axis = 0;
        loop {
            if axis == D {
                return coords;
            }
            current[axis] += 1;
            if current[axis] < start[axis] + count[axis] {
                break;
            }
            current[axis] = start[axis];
            axis += 1;
        }
    }
}

/// Decomposition of the staggered grids over a Cartesian grid of processes,
/// with a global index for every interior unknown.
///
/// The process layout is given by per-axis slab counts of owned pressure
/// cells; the velocity grids reuse the same slabs, losing one node on the
/// last slab along their own axis. Global indices are contiguous per process
/// (blocks ordered by rank), with the component blocks stacked inside a
/// rank's block and nodes ordered x-fastest inside each component block.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPartition<const D: usize> {
    proc_dims: [usize; D],
    flux_dims: [[usize; D]; D],
    pressure_dims: [usize; D],
    flux_counts: Vec<[Vec<usize>; D]>,
    pressure_counts: [Vec<usize>; D],
    flux_offsets: Vec<[Vec<usize>; D]>,
    pressure_offsets: [Vec<usize>; D],
    flux_ranges: Vec<OwnershipRange>,
    pressure_ranges: Vec<OwnershipRange>,
}

fn cumulative(counts: &[usize]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(counts.len() + 1);
    let mut sum = 0;
    offsets.push(0);
    for &c in counts {
        sum += c;
        offsets.push(sum);
    }
    offsets
}

impl<const D: usize> GridPartition<D> {
    /// Builds the partition from explicit per-axis slab counts of pressure
    /// cells, as handed over by the outer decomposition layer.
    pub fn new(
        mesh: &CartesianMesh<D>,
        proc_dims: [usize; D],
        pressure_counts: [Vec<usize>; D],
    ) -> Result<Self, PartitionError> {
        for a in 0..D {
            if proc_dims[a] == 0 {
                return Err(PartitionError::InvalidLayout(format!(
                    "Process grid has zero extent along axis {}",
                    a
                )));
            }
            if pressure_counts[a].len() != proc_dims[a] {
                return Err(PartitionError::InvalidLayout(format!(
                    "Axis {}: {} slab counts for {} process slabs",
                    a,
                    pressure_counts[a].len(),
                    proc_dims[a]
                )));
            }
            let total: usize = pressure_counts[a].iter().sum();
            if total != mesh.cells(a) {
                return Err(PartitionError::InvalidLayout(format!(
                    "Axis {}: slab counts sum to {} but the mesh has {} cells",
                    a,
                    total,
                    mesh.cells(a)
                )));
            }
            if pressure_counts[a].iter().any(|&c| c == 0) {
                return Err(PartitionError::InvalidLayout(format!(
                    "Axis {}: every process slab must own at least one cell",
                    a
                )));
            }
            if *pressure_counts[a].last().unwrap() < 2 {
                return Err(PartitionError::InvalidLayout(format!(
                    "Axis {}: the last slab must own at least 2 cells so the staggered grid keeps a node on it",
                    a
                )));
            }
        }

        let pressure_dims = mesh.pressure_interior();
        let flux_dims: [[usize; D]; D] = std::array::from_fn(|c| mesh.flux_interior(c));

        // velocity grids share the pressure slabs; the component's own axis
        // has one node fewer, taken off the last slab
        let flux_counts: Vec<[Vec<usize>; D]> = (0..D)
            .map(|c| {
                std::array::from_fn(|a| {
                    let mut counts = pressure_counts[a].clone();
                    if a == c {
                        *counts.last_mut().unwrap() -= 1;
                    }
                    counts
                })
            })
            .collect();

        let pressure_offsets: [Vec<usize>; D] =
            std::array::from_fn(|a| cumulative(&pressure_counts[a]));
        let flux_offsets: Vec<[Vec<usize>; D]> = flux_counts
            .iter()
            .map(|per_axis| std::array::from_fn(|a| cumulative(&per_axis[a])))
            .collect();

        let num_ranks: usize = proc_dims.iter().product();
        let mut flux_ranges = Vec::with_capacity(num_ranks);
        let mut pressure_ranges = Vec::with_capacity(num_ranks);
        let mut flux_start = 0;
        let mut pressure_start = 0;
        for rank in 0..num_ranks {
            let cell = cell_of_rank(proc_dims, rank);
            let local_flux: usize = (0..D)
                .map(|c| {
                    (0..D)
                        .map(|a| flux_counts[c][a][cell[a]])
                        .product::<usize>()
                })
                .sum();
            let local_pressure: usize = (0..D).map(|a| pressure_counts[a][cell[a]]).product();
            flux_ranges.push(OwnershipRange::new(flux_start, flux_start + local_flux));
            pressure_ranges.push(OwnershipRange::new(
                pressure_start,
                pressure_start + local_pressure,
            ));
            flux_start += local_flux;
            pressure_start += local_pressure;
        }

        Ok(Self {
            proc_dims,
            flux_dims,
            pressure_dims,
            flux_counts,
            pressure_counts,
            flux_offsets,
            pressure_offsets,
            flux_ranges,
            pressure_ranges,
        })
    }

    /// Splits each axis as evenly as possible over `proc_dims` processes
    /// (earlier slabs take the remainder cells).
    pub fn split(mesh: &CartesianMesh<D>, proc_dims: [usize; D]) -> Result<Self, PartitionError> {
        for a in 0..D {
            if proc_dims[a] == 0 {
                return Err(PartitionError::InvalidLayout(format!(
                    "Process grid has zero extent along axis {}",
                    a
                )));
            }
        }
        let pressure_counts: [Vec<usize>; D] = std::array::from_fn(|a| {
            let n = mesh.cells(a);
            let p = proc_dims[a];
            let base = n / p;
            let rem = n % p;
            (0..p).map(|s| base + usize::from(s < rem)).collect()
        });
        Self::new(mesh, proc_dims, pressure_counts)
    }

    pub fn proc_dims(&self) -> [usize; D] {
        self.proc_dims
    }

    pub fn num_ranks(&self) -> usize {
        self.proc_dims.iter().product()
    }

    pub fn rank_of_cell(&self, cell: [usize; D]) -> usize {
        let mut rank = 0;
        let mut stride = 1;
        for a in 0..D {
            rank += cell[a] * stride;
            stride *= self.proc_dims[a];
        }
        rank
    }

    pub fn cell_of_rank(&self, rank: usize) -> [usize; D] {
        cell_of_rank(self.proc_dims, rank)
    }

    pub fn flux_unknowns(&self) -> usize {
        self.flux_ranges.last().map_or(0, |r| r.end)
    }

    pub fn pressure_unknowns(&self) -> usize {
        self.pressure_ranges.last().map_or(0, |r| r.end)
    }

    /// Combined velocity-unknown range owned by `rank`.
    pub fn flux_range(&self, rank: usize) -> OwnershipRange {
        self.flux_ranges[rank]
    }

    pub fn pressure_range(&self, rank: usize) -> OwnershipRange {
        self.pressure_ranges[rank]
    }

    /// Interior-node box of component `c` owned by `rank`: (start, count)
    /// per axis in global interior coordinates.
    pub fn owned_flux_box(&self, rank: usize, component: usize) -> ([usize; D], [usize; D]) {
        let cell = self.cell_of_rank(rank);
        let start = std::array::from_fn(|a| self.flux_offsets[component][a][cell[a]]);
        let count = std::array::from_fn(|a| self.flux_counts[component][a][cell[a]]);
        (start, count)
    }

    pub fn owned_pressure_box(&self, rank: usize) -> ([usize; D], [usize; D]) {
        let cell = self.cell_of_rank(rank);
        let start = std::array::from_fn(|a| self.pressure_offsets[a][cell[a]]);
        let count = std::array::from_fn(|a| self.pressure_counts[a][cell[a]]);
        (start, count)
    }

    /// Cumulative pressure-cell offsets per process slab along `axis`
    /// (length = slabs + 1); indexes directly into the mesh vertex arrays.
    pub fn pressure_slab_offsets(&self, axis: usize) -> &[usize] {
        &self.pressure_offsets[axis]
    }

    /// Global index of an interior node of the component-`component` grid,
    /// or None when the coordinate falls off the interior (a domain-boundary
    /// neighbor, dropped on insertion).
    pub fn flux_index(&self, component: usize, coord: [isize; D]) -> Option<usize> {
        let (cell, local, counts) = self.locate(coord, &self.flux_dims[component], |a| {
            self.flux_offsets[component][a].as_slice()
        })?;
        let rank = self.rank_of_cell(cell);
        let mut index = self.flux_ranges[rank].start;
        for c in 0..component {
            index += (0..D)
                .map(|a| self.flux_counts[c][a][cell[a]])
                .product::<usize>();
        }
        Some(index + box_offset(local, counts))
    }

    /// Global index of a pressure cell, in the pressure unknown space.
    pub fn pressure_index(&self, coord: [isize; D]) -> Option<usize> {
        let (cell, local, counts) =
            self.locate(coord, &self.pressure_dims, |a| self.pressure_offsets[a].as_slice())?;
        let rank = self.rank_of_cell(cell);
        Some(self.pressure_ranges[rank].start + box_offset(local, counts))
    }

    fn locate<'a>(
        &'a self,
        coord: [isize; D],
        dims: &[usize; D],
        offsets: impl Fn(usize) -> &'a [usize],
    ) -> Option<([usize; D], [usize; D], [usize; D])> {
        let mut cell = [0usize; D];
        let mut local = [0usize; D];
        let mut counts = [0usize; D];
        for a in 0..D {
            if coord[a] < 0 || coord[a] as usize >= dims[a] {
                return None;
            }
            let x = coord[a] as usize;
            let offs = offsets(a);
            let slab = offs.partition_point(|&o| o <= x) - 1;
            cell[a] = slab;
            local[a] = x - offs[slab];
            counts[a] = offs[slab + 1] - offs[slab];
        }
        Some((cell, local, counts))
    }
}

fn cell_of_rank<const D: usize>(proc_dims: [usize; D], rank: usize) -> [usize; D] {
    let mut rest = rank;
    std::array::from_fn(|a| {
        let c = rest % proc_dims[a];
        rest /= proc_dims[a];
        c
    })
}

fn box_offset<const D: usize>(local: [usize; D], counts: [usize; D]) -> usize {
    let mut offset = 0;
    let mut stride = 1;
    for a in 0..D {
        offset += local[a] * stride;
        stride *= counts[a];
    }
    offset
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh_4x4() -> CartesianMesh<2> {
        CartesianMesh::uniform([4, 4], [0.0, 0.0], [1.0, 1.0]).unwrap()
    }

    #[test]
    fn test_single_process_ranges() {
        let mesh = mesh_4x4();
        let partition = GridPartition::split(&mesh, [1, 1]).unwrap();
        assert_eq!(partition.num_ranks(), 1);
        assert_eq!(partition.flux_range(0), OwnershipRange::new(0, 12 + 12));
        assert_eq!(partition.pressure_range(0), OwnershipRange::new(0, 16));
    }

    #[test]
    fn test_ranges_tile_the_index_space() {
        let mesh = mesh_4x4();
        let partition = GridPartition::split(&mesh, [2, 2]).unwrap();
        let mut expected_start = 0;
        for rank in 0..partition.num_ranks() {
            let range = partition.flux_range(rank);
            assert_eq!(range.start, expected_start);
            assert!(!range.is_empty());
            expected_start = range.end;
        }
        assert_eq!(expected_start, partition.flux_unknowns());
    }

    #[test]
    fn test_flux_index_is_a_bijection() {
        let mesh = mesh_4x4();
        let partition = GridPartition::split(&mesh, [2, 1]).unwrap();
        let mut seen = Vec::new();
        for c in 0..2 {
            let dims = mesh.flux_interior(c);
            for coord in box_coords([0, 0], dims) {
                let index = partition
                    .flux_index(c, [coord[0] as isize, coord[1] as isize])
                    .unwrap();
                seen.push(index);
            }
        }
        seen.sort_unstable();
        let expected: Vec<usize> = (0..partition.flux_unknowns()).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_flux_index_respects_ownership() {
        let mesh = mesh_4x4();
        let partition = GridPartition::split(&mesh, [2, 1]).unwrap();
        for rank in 0..2 {
            for c in 0..2 {
                let (start, count) = partition.owned_flux_box(rank, c);
                for coord in box_coords(start, count) {
                    let index = partition
                        .flux_index(c, [coord[0] as isize, coord[1] as isize])
                        .unwrap();
                    assert!(partition.flux_range(rank).contains(index));
                }
            }
        }
    }

    #[test]
    fn test_boundary_neighbors_are_dropped() {
        let mesh = mesh_4x4();
        let partition = GridPartition::split(&mesh, [1, 1]).unwrap();
        assert_eq!(partition.flux_index(0, [-1, 0]), None);
        assert_eq!(partition.flux_index(0, [3, 0]), None); // u has 3 interior faces
        assert_eq!(partition.flux_index(0, [0, 4]), None);
        assert!(partition.flux_index(0, [2, 3]).is_some());
    }

    #[test]
    fn test_pressure_index_blocks_by_rank() {
        let mesh = mesh_4x4();
        let partition = GridPartition::split(&mesh, [2, 1]).unwrap();
        // left half of the cells on rank 0, right half on rank 1
        assert_eq!(partition.pressure_index([0, 0]), Some(0));
        assert_eq!(partition.pressure_index([1, 3]), Some(7));
        assert_eq!(partition.pressure_index([2, 0]), Some(8));
        assert_eq!(partition.pressure_slab_offsets(0), &[0, 2, 4]);
    }

    #[test]
    fn test_invalid_layouts() {
        let mesh = mesh_4x4();
        assert!(GridPartition::new(&mesh, [2, 1], [vec![3, 1], vec![4]]).is_err()); // last slab too thin
        assert!(GridPartition::new(&mesh, [2, 1], [vec![1, 2], vec![4]]).is_err()); // wrong sum
        assert!(GridPartition::new(&mesh, [2, 1], [vec![4], vec![4]]).is_err()); // wrong slab count
        assert!(GridPartition::split(&mesh, [0, 1]).is_err());
    }

    #[test]
    fn test_box_coords_x_fastest() {
        let coords = box_coords([1, 2], [2, 2]);
        assert_eq!(coords, vec![[1, 2], [2, 2], [1, 3], [2, 3]]);
    }
}

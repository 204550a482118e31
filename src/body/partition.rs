//! Spatial partitioning of body points over the grid's process
//! decomposition.

use crate::body::points::BodyPoints;
use crate::domain::mesh::CartesianMesh;
use crate::domain::partition::GridPartition;
use crate::error::PartitionError;
use tracing::info;

/// Result of one partition event: per-rank membership of the body points,
/// plus the pressure-node counts needed to size the companion scalar
/// operator. Immutable once built; body motion means rebuilding from
/// scratch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyPartition {
    /// Owning rank per body point.
    pub owner: Vec<usize>,
    /// Point indices owned by each rank, in input order.
    pub point_indices: Vec<Vec<usize>>,
    pub points_on_process: Vec<usize>,
    pub pressure_nodes_on_process: Vec<usize>,
}

/// Assigns each body point to the process whose pressure sub-domain
/// spatially contains it.
///
/// Membership per axis is half-open: `>= lower, < upper` against the
/// cumulative slab boundaries of the pressure decomposition, so a point
/// sitting exactly on an internal process boundary goes to the slab that
/// starts there, never to both. A point contained by no sub-domain (e.g.
/// exactly on the global upper boundary) is an error, not a silent drop.
pub fn partition_body_points<const D: usize>(
    mesh: &CartesianMesh<D>,
    partition: &GridPartition<D>,
    points: &BodyPoints<D>,
) -> Result<BodyPartition, PartitionError> {
    let num_ranks = partition.num_ranks();
    let mut owner: Vec<Option<usize>> = vec![None; points.len()];
    let mut point_indices: Vec<Vec<usize>> = vec![Vec::new(); num_ranks];
    let mut points_on_process = vec![0usize; num_ranks];
    let mut pressure_nodes_on_process = vec![0usize; num_ranks];

    for rank in 0..num_ranks {
        let cell = partition.cell_of_rank(rank);
        let bounds: [(f64, f64); D] = std::array::from_fn(|a| {
            let offsets = partition.pressure_slab_offsets(a);
            let vertices = mesh.vertices(a);
            (vertices[offsets[cell[a]]], vertices[offsets[cell[a] + 1]])
        });
        let (_, counts) = partition.owned_pressure_box(rank);
        pressure_nodes_on_process[rank] = counts.iter().product();

        let contains = |p: &[f64; D]| {
            (0..D).all(|a| p[a] >= bounds[a].0 && p[a] < bounds[a].1)
        };

        // count first, then collect, so the membership list is allocated once
        for p in points.iter() {
            if contains(p) {
                points_on_process[rank] += 1;
            }
        }
        point_indices[rank].reserve(points_on_process[rank]);
        for (l, p) in points.iter().enumerate() {
            if contains(p) {
                point_indices[rank].push(l);
                owner[l] = Some(rank);
            }
        }
    }

    let owner = owner
        .into_iter()
        .enumerate()
        .map(|(l, o)| {
            o.ok_or_else(|| PartitionError::PointOutsideDomain {
                index: l,
                position: points.position(l).to_vec(),
            })
        })
        .collect::<Result<Vec<usize>, _>>()?;

    info!(
        points = points.len(),
        ranks = num_ranks,
        "partitioned body points: {:?}",
        points_on_process
    );

    Ok(BodyPartition {
        owner,
        point_indices,
        points_on_process,
        pressure_nodes_on_process,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_rank_setup() -> (CartesianMesh<2>, GridPartition<2>) {
        let mesh = CartesianMesh::uniform([4, 4], [0.0, 0.0], [1.0, 1.0]).unwrap();
        let partition = GridPartition::split(&mesh, [2, 1]).unwrap();
        (mesh, partition)
    }

    #[test]
    fn test_two_process_end_to_end_counts() {
        let (mesh, partition) = two_rank_setup();
        // two points in the left half, one in the right half
        let points =
            BodyPoints::new(vec![[0.2, 0.3], [0.3, 0.6], [0.7, 0.4]]).unwrap();
        let bodies = partition_body_points(&mesh, &partition, &points).unwrap();
        assert_eq!(bodies.points_on_process, vec![2, 1]);
        assert_eq!(bodies.point_indices[0], vec![0, 1]);
        assert_eq!(bodies.point_indices[1], vec![2]);
        assert_eq!(bodies.owner, vec![0, 0, 1]);
        assert_eq!(bodies.pressure_nodes_on_process, vec![8, 8]);
    }

    #[test]
    fn test_every_point_has_exactly_one_owner() {
        let mesh = CartesianMesh::uniform([6, 6], [0.0, 0.0], [1.0, 1.0]).unwrap();
        let partition = GridPartition::split(&mesh, [2, 2]).unwrap();
        let points = BodyPoints::<2>::circle([0.5, 0.5], 0.3, 17).unwrap();
        let bodies = partition_body_points(&mesh, &partition, &points).unwrap();
        let total: usize = bodies.points_on_process.iter().sum();
        assert_eq!(total, points.len());
        let mut seen = vec![0usize; points.len()];
        for list in &bodies.point_indices {
            for &l in list {
                seen[l] += 1;
            }
        }
        assert!(seen.iter().all(|&c| c == 1));
    }

    #[test]
    fn test_boundary_point_goes_to_the_half_open_interval() {
        let (mesh, partition) = two_rank_setup();
        // x = 0.5 is the internal process boundary: `>= lower` puts the
        // point on the rank whose interval starts there
        let points = BodyPoints::new(vec![[0.5, 0.25]]).unwrap();
        let bodies = partition_body_points(&mesh, &partition, &points).unwrap();
        assert_eq!(bodies.owner, vec![1]);
        assert_eq!(bodies.points_on_process, vec![0, 1]);
    }

    #[test]
    fn test_point_on_global_upper_boundary_is_an_error() {
        let (mesh, partition) = two_rank_setup();
        let points = BodyPoints::new(vec![[1.0, 0.5]]).unwrap();
        let err = partition_body_points(&mesh, &partition, &points).unwrap_err();
        match err {
            PartitionError::PointOutsideDomain { index, position } => {
                assert_eq!(index, 0);
                assert_eq!(position, vec![1.0, 0.5]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_partitioning_is_idempotent() {
        let (mesh, partition) = two_rank_setup();
        let points = BodyPoints::<2>::circle([0.4, 0.6], 0.2, 11).unwrap();
        let first = partition_body_points(&mesh, &partition, &points).unwrap();
        let second = partition_body_points(&mesh, &partition, &points).unwrap();
        assert_eq!(first, second);
    }
}

use ibpm_rs::body::indexing::BodyIndexMap;
use ibpm_rs::body::partition::partition_body_points;
use ibpm_rs::body::points::BodyPoints;
use ibpm_rs::comm::ProcessGroup;
use ibpm_rs::domain::mesh::CartesianMesh;
use ibpm_rs::domain::partition::GridPartition;
use ibpm_rs::operators::coupling::{CouplingAssembler, RomaKernel};
use ibpm_rs::operators::implicit::ImplicitAssembler;
use ibpm_rs::params::SimulationParameters;
use nalgebra::DVector;
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    // cylinder in a unit box, split over a 2x2 process grid
    let mesh = CartesianMesh::<2>::uniform([32, 32], [0.0, 0.0], [1.0, 1.0])?;
    let partition = GridPartition::split(&mesh, [2, 2])?;
    let group = ProcessGroup::new(partition.num_ranks())?;

    let points = BodyPoints::<2>::circle([0.5, 0.5], 0.2, 48)?;
    let bodies = partition_body_points(&mesh, &partition, &points)?;
    let forces = BodyIndexMap::build(&bodies, 2)?;
    let scalars = BodyIndexMap::build(&bodies, 1)?;
    info!(
        "Body points per process: {:?}",
        bodies.points_on_process
    );

    let params = SimulationParameters::new(0.01, 0.005, 0.5)?;
    let n = partition.flux_unknowns();
    let mass = DVector::from_element(n, 1.0);
    let inv_metric = DVector::from_element(n, 1.0);

    let implicit = ImplicitAssembler::new(&mesh, &partition, params, &mass, &inv_metric)?
        .assemble(&group)?;

    let kernel = RomaKernel;
    let coupling =
        CouplingAssembler::new(&mesh, &partition, &points, &bodies, &forces, &kernel)?;
    let spread = coupling.assemble_spread(&group)?;
    let interpolate = coupling.assemble_interpolate(&group)?;
    let scalar = coupling.assemble_scalar(&scalars, &group)?;

    println!(
        "Implicit operator: {}x{}, {} non-zeros",
        implicit.m,
        implicit.n,
        implicit.x.len()
    );
    println!(
        "Spread operator: {}x{}, {} non-zeros",
        spread.m,
        spread.n,
        spread.x.len()
    );
    println!(
        "Interpolation operator: {}x{}, {} non-zeros",
        interpolate.m,
        interpolate.n,
        interpolate.x.len()
    );
    println!(
        "Scalar coupling operator: {}x{}, {} non-zeros",
        scalar.m,
        scalar.n,
        scalar.x.len()
    );

    Ok(())
}

//! Operator-assembly core of an immersed-boundary fractional-step solver:
//! the implicit momentum operator over a staggered Cartesian grid, the
//! spatial partitioning and global numbering of Lagrangian body points, and
//! the spread/interpolation operators coupling the two. The linear solves,
//! time stepping and I/O around these operators live with the outer solver.

pub mod body;
pub mod comm;
pub mod domain;
pub mod error;
pub mod operators;
pub mod params;
pub mod sparse;

pub mod mesh;
pub mod partition;

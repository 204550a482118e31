pub mod indexing;
pub mod partition;
pub mod points;

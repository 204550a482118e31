use thiserror::Error;

#[derive(Error, Debug)]
pub enum MeshError {
    #[error("Unsupported spatial dimension: {0} (only 2 and 3 are handled)")]
    UnsupportedDimension(usize),

    #[error("Invalid mesh axis: {0}")]
    InvalidAxis(String),
}

#[derive(Error, Debug)]
pub enum PartitionError {
    #[error("Invalid process layout: {0}")]
    InvalidLayout(String),

    #[error("Body point {index} at {position:?} lies outside every process sub-domain")]
    PointOutsideDomain { index: usize, position: Vec<f64> },
}

#[derive(Error, Debug)]
pub enum BodyError {
    #[error("Invalid body point: {0}")]
    InvalidPoint(String),

    #[error("Geometry file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Geometry file format error: {0}")]
    Format(String),
}

#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Assembly precondition violated: {0}")]
    Precondition(String),

    #[error("Non-zero sizing mismatch: {0}")]
    SizeMismatch(String),

    #[error("Incomplete collective: {0}")]
    IncompleteCollective(String),
}

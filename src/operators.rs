pub mod coupling;
pub mod implicit;
pub mod stencil;

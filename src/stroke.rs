pub mod model;
pub mod recorder;

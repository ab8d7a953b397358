pub mod animate;
pub mod engine;
pub mod export;

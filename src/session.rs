pub mod flow;
pub mod gateway;

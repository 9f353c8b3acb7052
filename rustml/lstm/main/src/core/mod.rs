pub mod data;
pub mod generator;
pub mod math;
pub mod nn;
pub mod optim;
pub mod serde;
pub mod training;

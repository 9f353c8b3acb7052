pub mod error;
pub mod optim;
pub mod types;

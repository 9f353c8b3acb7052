pub mod dense;
pub mod vector;

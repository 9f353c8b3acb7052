pub mod corpus;
pub mod symbols;

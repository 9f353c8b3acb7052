pub mod cache;
pub mod init;
pub mod lstm;
pub mod params;
pub mod stack;

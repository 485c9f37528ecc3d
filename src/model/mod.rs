pub mod config;
pub mod role;

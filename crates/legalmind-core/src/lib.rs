pub mod agent;
pub mod blob;
pub mod chat;
pub mod config;
pub mod gcp;
pub mod model;
pub mod prompt;
pub mod repo;
pub mod store;
pub mod tool;
pub mod types;

pub use types::*;

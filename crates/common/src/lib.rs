pub mod config;
pub mod error;
pub mod generator;
pub mod observability;
pub mod snapshots;
pub mod types;

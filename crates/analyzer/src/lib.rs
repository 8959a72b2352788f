pub mod address_tracker;
pub mod attribution;
pub mod cli;
pub mod comparator;
pub mod dataset;
pub mod metrics;
pub mod multipliers;
pub mod normalizer;
pub mod pool_analysis;
pub mod positions;
pub mod records;
pub mod statistics;

pub use dataset::{Dataset, DatasetReport, DatasetSummary};

use metrics::{counter, describe_counter, describe_gauge, gauge};

use crate::dataset::DatasetSummary;

pub const SNAPSHOT_LOADS: &str = "reg_snapshot_loads_total";
pub const DATASET_LOADS: &str = "reg_dataset_loads_total";
pub const DATASET_HOLDERS: &str = "reg_dataset_holders";
pub const DATASET_POOL_WALLETS: &str = "reg_dataset_pool_wallets";

pub fn describe() {
    describe_counter!(
        SNAPSHOT_LOADS,
        "Historical snapshot loads, labelled by outcome."
    );
    describe_counter!(
        DATASET_LOADS,
        "Datasets made current, labelled by where they came from."
    );
    describe_gauge!(DATASET_HOLDERS, "Balance rows in the current dataset.");
    describe_gauge!(
        DATASET_POOL_WALLETS,
        "Wallets with at least one pool position in the current dataset."
    );
}

pub fn record_snapshot_load(outcome: &'static str) {
    counter!(SNAPSHOT_LOADS, "outcome" => outcome).increment(1);
}

/// `source` is one of `upload`, `snapshot`, `generator`, `file`.
pub fn record_dataset_loaded(source: &'static str, summary: &DatasetSummary) {
    counter!(DATASET_LOADS, "source" => source).increment(1);
    gauge!(DATASET_HOLDERS).set(summary.holders as f64);
    gauge!(DATASET_POOL_WALLETS).set(summary.pool_wallets as f64);
}

//! Follows one address across the current dataset and every historical
//! snapshot. Snapshot fetches run concurrently; a fetch that fails or times
//! out becomes a `found = false` row instead of failing the whole search.

use std::time::Duration;

use common::error::SnapshotError;
use common::snapshots::{newest_first, SnapshotSource};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use crate::dataset::Dataset;
use crate::metrics::record_snapshot_load;
use crate::normalizer::normalize_address;
use crate::positions::{distinct_exchange_count, pool_liquidity};
use crate::records::{LiquidityPosition, PositionKind};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolBreakdown {
    pub pool_count: usize,
    #[serde(rename = "regInPools")]
    pub reg_in_pools: f64,
    pub in_range_count: usize,
    #[serde(rename = "inRangeREG")]
    pub in_range_reg: f64,
    pub out_of_range_count: usize,
    #[serde(rename = "outOfRangeREG")]
    pub out_of_range_reg: f64,
    pub concentrated_count: usize,
    pub simple_count: usize,
    pub distinct_exchanges: usize,
}

impl PoolBreakdown {
    /// `None` when there are no positions to break down.
    pub fn from_positions(positions: &[LiquidityPosition]) -> Option<Self> {
        if positions.is_empty() {
            return None;
        }
        let mut b = Self {
            pool_count: positions.len(),
            reg_in_pools: pool_liquidity(positions),
            distinct_exchanges: distinct_exchange_count(positions),
            ..Self::default()
        };
        for p in positions {
            match p.kind {
                PositionKind::Concentrated => b.concentrated_count += 1,
                PositionKind::Simple => b.simple_count += 1,
            }
            if p.is_active {
                b.in_range_count += 1;
                b.in_range_reg += p.reg_amount;
            } else {
                b.out_of_range_count += 1;
                b.out_of_range_reg += p.reg_amount;
            }
        }
        Some(b)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressSnapshotResult {
    pub label: String,
    pub is_current: bool,
    pub found: bool,
    #[serde(rename = "totalREG")]
    pub total_reg: f64,
    pub power: f64,
    pub pools: Option<PoolBreakdown>,
    /// Why the snapshot could not be searched, when it failed to load.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AddressSnapshotResult {
    fn not_found(label: &str, is_current: bool, error: Option<String>) -> Self {
        Self {
            label: label.to_string(),
            is_current,
            found: false,
            total_reg: 0.0,
            power: 0.0,
            pools: None,
            error,
        }
    }
}

/// Profile `address` in one dataset. Found means the address has a balance
/// row or a voting-power record.
pub fn lookup_address(dataset: &Dataset, address: &str, is_current: bool) -> AddressSnapshotResult {
    let balance = dataset.balance_of(address);
    let power = dataset.power_record(address);
    if balance.is_none() && power.is_none() {
        return AddressSnapshotResult::not_found(dataset.label(), is_current, None);
    }
    AddressSnapshotResult {
        label: dataset.label().to_string(),
        is_current,
        found: true,
        total_reg: balance.map_or(0.0, |b| b.total_reg),
        power: power.unwrap_or(0.0),
        pools: balance.and_then(|b| PoolBreakdown::from_positions(&b.positions)),
        error: None,
    }
}

async fn fetch_snapshot<S: SnapshotSource>(
    source: &S,
    date: &str,
    timeout: Duration,
) -> Result<Dataset, SnapshotError> {
    let docs = tokio::time::timeout(timeout, source.load_snapshot(date))
        .await
        .map_err(|_elapsed| SnapshotError::TimedOut(timeout.as_secs()))??;
    Ok(Dataset::from_snapshot(&docs))
}

/// One row per dataset: `current` first (when given), then `dates` newest to oldest.
pub async fn track_address<S: SnapshotSource + Sync>(
    source: &S,
    current: Option<&Dataset>,
    address: &str,
    dates: &[String],
    fetch_timeout: Duration,
) -> Vec<AddressSnapshotResult> {
    let Some(address) = normalize_address(address) else {
        return Vec::new();
    };

    let fetches = dates.iter().map(|date| {
        let address = address.as_str();
        async move {
            match fetch_snapshot(source, date, fetch_timeout).await {
                Ok(ds) => {
                    record_snapshot_load("ok");
                    lookup_address(&ds, address, false)
                }
                Err(e) => {
                    record_snapshot_load("error");
                    warn!(date = %date, error = %e, "snapshot load failed, marking not found");
                    AddressSnapshotResult::not_found(date, false, Some(e.to_string()))
                }
            }
        }
    });
    let mut historical = join_all(fetches).await;
    historical.sort_by(|a, b| newest_first(&a.label, &b.label));

    let mut results = Vec::with_capacity(historical.len() + 1);
    if let Some(ds) = current {
        results.push(lookup_address(ds, &address, true));
    }
    results.extend(historical);

    debug!(
        address = %address,
        snapshots = results.len(),
        found = results.iter().filter(|r| r.found).count(),
        "address tracked"
    );
    results
}

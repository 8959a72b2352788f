use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::records::{BalanceRecord, PositionKind};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeTotals {
    pub reg: f64,
    pub positions: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KindTotals {
    pub reg: f64,
    pub positions: usize,
    /// Keyed by exchange name, so output order is alphabetical.
    pub by_exchange: BTreeMap<String, ExchangeTotals>,
}

impl KindTotals {
    fn add(&mut self, exchange: &str, reg: f64) {
        self.reg += reg;
        self.positions += 1;
        let entry = self.by_exchange.entry(exchange.to_string()).or_default();
        entry.reg += reg;
        entry.positions += 1;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolAnalysis {
    pub concentrated: KindTotals,
    pub simple: KindTotals,
    /// Unique `(network, poolAddress)` pairs; positions without a pool address are not counted.
    pub distinct_pools: usize,
    pub wallets_with_pools: usize,
    #[serde(rename = "totalPoolREG")]
    pub total_pool_reg: f64,
}

pub fn analyze_pools(balances: &[BalanceRecord]) -> PoolAnalysis {
    let mut analysis = PoolAnalysis::default();
    let mut pools = HashSet::new();

    for wallet in balances.iter().filter(|b| !b.positions.is_empty()) {
        analysis.wallets_with_pools += 1;
        for p in &wallet.positions {
            let totals = match p.kind {
                PositionKind::Concentrated => &mut analysis.concentrated,
                PositionKind::Simple => &mut analysis.simple,
            };
            totals.add(&p.exchange, p.reg_amount);
            analysis.total_pool_reg += p.reg_amount;
            if let Some(pool) = &p.pool_address {
                pools.insert((p.network.as_str(), pool.as_str()));
            }
        }
    }
    analysis.distinct_pools = pools.len();
    analysis
}

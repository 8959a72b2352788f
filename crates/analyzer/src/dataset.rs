//! One loaded balance + voting-power pair and every aggregate derived from it.
//! Aggregates are computed on demand from the normalized records; nothing is
//! memoized.

use std::path::Path;

use anyhow::{Context, Result};
use common::types::{parse_rows, DocumentKind, RawRecord, SnapshotDocuments};
use serde::Serialize;
use serde_json::Value;

use crate::attribution::{
    build_profile, pool_power_correlation, position_multipliers, PositionMultiplier, PowerIndex,
    WalletPoolProfile,
};
use crate::multipliers::MultiplierTable;
use crate::normalizer::{normalize_address, normalize_balances, normalize_voting_power};
use crate::pool_analysis::{analyze_pools, PoolAnalysis};
use crate::records::{BalanceRecord, VotingPowerRecord};
use crate::statistics::{concentration, distribution, summarize, Concentration, DistributionBin, SummaryStats};

pub const CURRENT_LABEL: &str = "current";
pub const DEFAULT_TOP_N: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSummary {
    pub holders: usize,
    pub pool_wallets: usize,
    pub total_power: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Holder {
    pub address: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletDetail {
    pub profile: WalletPoolProfile,
    pub positions: Vec<PositionMultiplier>,
    /// Fallback-table estimate; informational, `profile.boostMultiplier` is authoritative.
    pub estimated_average_multiplier: f64,
}

/// Everything the dashboard renders for one dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetReport {
    pub label: String,
    pub summary: DatasetSummary,
    pub balance_stats: Option<SummaryStats>,
    pub voting_power_stats: Option<SummaryStats>,
    pub balance_distribution: Vec<DistributionBin>,
    pub voting_power_distribution: Vec<DistributionBin>,
    pub top_balance_holders: Vec<Holder>,
    pub top_voting_power_holders: Vec<Holder>,
    pub balance_concentration: Option<Concentration>,
    pub pool_analysis: PoolAnalysis,
    pub pool_power_correlation: Vec<WalletPoolProfile>,
}

#[derive(Debug, Clone)]
pub struct Dataset {
    label: String,
    balances: Vec<BalanceRecord>,
    voting_power: Vec<VotingPowerRecord>,
    power: PowerIndex,
}

fn top_n(mut holders: Vec<Holder>, n: usize) -> Vec<Holder> {
    // sort_by is stable: equal amounts keep dataset order
    holders.sort_by(|a, b| b.amount.total_cmp(&a.amount));
    holders.truncate(n);
    holders
}

impl Dataset {
    pub fn new(label: impl Into<String>, balances: Vec<BalanceRecord>, voting_power: Vec<VotingPowerRecord>) -> Self {
        let power = PowerIndex::new(&voting_power);
        Self {
            label: label.into(),
            balances,
            voting_power,
            power,
        }
    }

    pub fn from_rows(label: impl Into<String>, balances: &[RawRecord], voting_power: &[RawRecord]) -> Self {
        Self::new(label, normalize_balances(balances), normalize_voting_power(voting_power))
    }

    pub fn from_snapshot(docs: &SnapshotDocuments) -> Self {
        Self::from_rows(docs.date.clone(), &docs.balances, &docs.voting_power)
    }

    /// Parse two already-decoded documents (bare list or `result`-wrapped).
    pub fn from_documents(label: impl Into<String>, balances: &Value, voting_power: &Value) -> Result<Self> {
        let b = common::types::unwrap_rows(balances, DocumentKind::Balances).context("balances document")?;
        let v = common::types::unwrap_rows(voting_power, DocumentKind::VotingPower)
            .context("voting power document")?;
        Ok(Self::from_rows(label, &b, &v))
    }

    pub fn load_files(label: impl Into<String>, balances: &Path, voting_power: &Path) -> Result<Self> {
        let read = |path: &Path, kind: DocumentKind| -> Result<Vec<RawRecord>> {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            parse_rows(&text, kind).with_context(|| format!("failed to parse {}", path.display()))
        };
        let b = read(balances, DocumentKind::Balances)?;
        let v = read(voting_power, DocumentKind::VotingPower)?;
        Ok(Self::from_rows(label, &b, &v))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn balances(&self) -> &[BalanceRecord] {
        &self.balances
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty() && self.voting_power.is_empty()
    }

    pub fn balance_of(&self, address: &str) -> Option<&BalanceRecord> {
        let address = normalize_address(address)?;
        self.balances.iter().find(|b| b.address == address)
    }

    /// Voting power recorded for `address`, `None` if it has no record.
    pub fn power_record(&self, address: &str) -> Option<f64> {
        self.power.get(address.trim())
    }

    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary {
            holders: self.balances.len(),
            pool_wallets: self.balances.iter().filter(|b| !b.positions.is_empty()).count(),
            total_power: self.voting_power.iter().map(|v| v.power).sum(),
        }
    }

    fn balance_values(&self) -> Vec<f64> {
        self.balances.iter().map(|b| b.total_reg).collect()
    }

    fn power_values(&self) -> Vec<f64> {
        self.voting_power.iter().map(|v| v.power).collect()
    }

    pub fn balance_stats(&self) -> Option<SummaryStats> {
        summarize(&self.balance_values())
    }

    pub fn voting_power_stats(&self) -> Option<SummaryStats> {
        summarize(&self.power_values())
    }

    pub fn balance_distribution(&self) -> Vec<DistributionBin> {
        distribution(&self.balance_values())
    }

    pub fn voting_power_distribution(&self) -> Vec<DistributionBin> {
        distribution(&self.power_values())
    }

    pub fn balance_concentration(&self) -> Option<Concentration> {
        concentration(&self.balance_values())
    }

    pub fn top_balance_holders(&self, n: usize) -> Vec<Holder> {
        let holders = self
            .balances
            .iter()
            .map(|b| Holder {
                address: b.address.clone(),
                amount: b.total_reg,
            })
            .collect();
        top_n(holders, n)
    }

    pub fn top_voting_power_holders(&self, n: usize) -> Vec<Holder> {
        let holders = self
            .voting_power
            .iter()
            .map(|v| Holder {
                address: v.address.clone(),
                amount: v.power,
            })
            .collect();
        top_n(holders, n)
    }

    pub fn pool_analysis(&self) -> PoolAnalysis {
        analyze_pools(&self.balances)
    }

    pub fn pool_power_correlation(&self) -> Vec<WalletPoolProfile> {
        pool_power_correlation(&self.balances, &self.power)
    }

    /// `None` when the address has no balance row.
    pub fn profile_for(&self, address: &str) -> Option<WalletPoolProfile> {
        let balance = self.balance_of(address)?;
        Some(build_profile(balance, self.power.power_of(&balance.address)))
    }

    pub fn wallet_detail(&self, address: &str, table: &MultiplierTable) -> Option<WalletDetail> {
        let profile = self.profile_for(address)?;
        Some(WalletDetail {
            positions: position_multipliers(&profile, table),
            estimated_average_multiplier: table.weighted_average(&profile.positions),
            profile,
        })
    }

    pub fn report(&self, top: usize) -> DatasetReport {
        DatasetReport {
            label: self.label.clone(),
            summary: self.summary(),
            balance_stats: self.balance_stats(),
            voting_power_stats: self.voting_power_stats(),
            balance_distribution: self.balance_distribution(),
            voting_power_distribution: self.voting_power_distribution(),
            top_balance_holders: self.top_balance_holders(top),
            top_voting_power_holders: self.top_voting_power_holders(top),
            balance_concentration: self.balance_concentration(),
            pool_analysis: self.pool_analysis(),
            pool_power_correlation: self.pool_power_correlation(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dataset(balances: Value, voting: Value) -> Dataset {
        Dataset::from_documents(CURRENT_LABEL, &balances, &voting).unwrap()
    }

    #[test]
    fn test_scenario_direct_only_wallet_not_in_correlation() {
        let ds = dataset(
            json!([{"address": "0xA", "totalBalanceREG": 1000}]),
            json!([{"address": "0xA", "votingPower": 1000}]),
        );
        let p = ds.profile_for("0xA").unwrap();
        assert_eq!(p.wallet_direct_reg, 1000.0);
        assert_eq!(p.pool_voting_share, 0.0);
        assert_eq!(p.boost_multiplier, 0.0);
        assert!(ds.pool_power_correlation().is_empty());
    }

    #[test]
    fn test_scenario_fully_pooled_wallet() {
        let ds = dataset(
            json!({"result": {"balances": [{
                "address": "0xB",
                "totalBalanceREG": "500",
                "sourceBalance": {"gnosis": {"dexs": {"X": [{"equivalentREG": 500}]}}}
            }]}}),
            json!({"result": {"votingPower": [{"address": "0xb", "votingPower": 2000}]}}),
        );
        let view = ds.pool_power_correlation();
        assert_eq!(view.len(), 1);
        let p = &view[0];
        assert_eq!(p.wallet_direct_reg, 0.0);
        assert_eq!(p.wallet_voting_share, 0.0);
        assert_eq!(p.pool_voting_share, 2000.0);
        assert_eq!(p.boost_multiplier, 4.0);
    }

    #[test]
    fn test_scenario_two_holders_stats() {
        let ds = dataset(
            json!([{"address": "0x1", "totalBalanceREG": 10}, {"address": "0x2", "totalBalanceREG": 30}]),
            json!([]),
        );
        let top = ds.top_balance_holders(DEFAULT_TOP_N);
        assert_eq!(top[0].address, "0x2");
        assert_eq!(top[1].address, "0x1");
        let s = ds.balance_stats().unwrap();
        assert_eq!((s.mean, s.median, s.std_dev), (20.0, 20.0, 10.0));
        assert!(ds.voting_power_stats().is_none());
    }

    #[test]
    fn test_top_holders_are_stable_on_ties() {
        let ds = dataset(
            json!([]),
            json!([
                {"address": "0x1", "votingPower": 5},
                {"address": "0x2", "votingPower": 9},
                {"address": "0x3", "votingPower": 5},
            ]),
        );
        let top: Vec<_> = ds.top_voting_power_holders(2).into_iter().map(|h| h.address).collect();
        assert_eq!(top, ["0x2", "0x1"]);
    }

    #[test]
    fn test_summary_counts() {
        let ds = dataset(
            json!([
                {"address": "0x1", "totalBalanceREG": 10, "sourceBalance": {"gnosis": {"dexs": {"balancer": [{"equivalentREG": 5}]}}}},
                {"address": "0x2", "totalBalanceREG": 10, "sourceBalance": {"gnosis": {"dexs": {"balancer": [{"equivalentREG": 0}]}}}},
                {"address": "0x3", "totalBalanceREG": 10},
            ]),
            json!([{"address": "0x1", "votingPower": 7.5}, {"address": "0x9", "votingPower": 2.5}]),
        );
        let s = ds.summary();
        assert_eq!(s.holders, 3);
        // 0x2's only position carries no REG
        assert_eq!(s.pool_wallets, 1);
        assert_eq!(s.total_power, 10.0);
    }

    #[test]
    fn test_wallet_detail_reports_both_multipliers() {
        let ds = dataset(
            json!([{
                "address": "0xa",
                "totalBalanceREG": 100,
                "sourceBalance": {"gnosis": {"dexs": {"sushiswap": [{"equivalentREG": 100}]}}}
            }]),
            json!([{"address": "0xa", "votingPower": 300}]),
        );
        let detail = ds.wallet_detail("0xA", &MultiplierTable::default()).unwrap();
        assert_eq!(detail.profile.boost_multiplier, 3.0);
        assert!((detail.positions[0].multiplier - 3.0).abs() < 1e-12);
        assert_eq!(detail.estimated_average_multiplier, 1.3);
        assert!(ds.wallet_detail("0xnope", &MultiplierTable::default()).is_none());
    }

    #[test]
    fn test_empty_dataset_report_is_unavailable_not_error() {
        let ds = dataset(json!([]), json!([]));
        assert!(ds.is_empty());
        let r = ds.report(DEFAULT_TOP_N);
        assert!(r.balance_stats.is_none());
        assert!(r.balance_concentration.is_none());
        assert!(r.pool_power_correlation.is_empty());
        assert_eq!(r.balance_distribution.len(), 6);
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let ds = dataset(
            json!([{"address": "0x1", "totalBalanceREG": 10}]),
            json!([{"address": "0x1", "votingPower": 10}]),
        );
        let v = serde_json::to_value(ds.report(5)).unwrap();
        assert!(v.get("balanceStats").is_some());
        assert!(v.get("poolPowerCorrelation").is_some());
        assert_eq!(v["summary"]["poolWallets"], json!(0));
        assert_eq!(v["topBalanceHolders"][0]["address"], json!("0x1"));
    }

    #[test]
    fn test_rejects_unrecognized_document() {
        let err = Dataset::from_documents(CURRENT_LABEL, &json!({"balances": []}), &json!([])).unwrap_err();
        assert!(format!("{err:#}").contains("balances document"));
    }
}

//! View models for dashboard templates.
//! Templates only print strings prepared here; no analytics happen in this module.

use analyzer::attribution::WalletPoolProfile;
use analyzer::dataset::Holder;
use analyzer::statistics::{DistributionBin, SummaryStats};
use analyzer::DatasetReport;

pub struct StatRow {
    pub label: &'static str,
    pub value: String,
}

/// One histogram bar; `width_pct` is relative to the fullest bin.
pub struct BinBar {
    pub label: String,
    pub count: usize,
    pub width_pct: String,
}

pub struct HolderRow {
    pub rank: usize,
    pub address: String,
    pub address_short: String,
    pub amount_display: String,
}

pub struct OverviewView {
    pub label: String,
    pub holders: usize,
    pub pool_wallets: usize,
    pub total_power_display: String,
    pub balance_stats: Vec<StatRow>,
    pub power_stats: Vec<StatRow>,
    pub balance_bins: Vec<BinBar>,
    pub power_bins: Vec<BinBar>,
    pub top_balances: Vec<HolderRow>,
    pub top_power: Vec<HolderRow>,
    /// Gini and top-10 share, when any balance is positive.
    pub gini_display: Option<String>,
    pub top10_display: Option<String>,
    pub distinct_pools: usize,
    pub pool_reg_display: String,
}

/// Row in the pool/power correlation table
pub struct CorrelationRow {
    pub address: String,
    pub address_short: String,
    pub total_display: String,
    pub pool_display: String,
    pub direct_display: String,
    pub power_display: String,
    pub pool_share_display: String,
    pub boost_display: String,
    /// Tailwind text color class
    pub boost_color: String,
    pub position_count: usize,
}

pub fn shorten_wallet(addr: &str) -> String {
    if addr.len() > 10 && addr.is_ascii() {
        format!("{}..{}", &addr[..6], &addr[addr.len() - 4..])
    } else {
        addr.to_string()
    }
}

/// Two decimals with `,` thousands separators.
pub fn format_amount(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{frac}")
}

fn stat_rows(stats: Option<&SummaryStats>) -> Vec<StatRow> {
    let Some(s) = stats else {
        return Vec::new();
    };
    vec![
        StatRow { label: "Count", value: s.count.to_string() },
        StatRow { label: "Total", value: format_amount(s.total) },
        StatRow { label: "Mean", value: format_amount(s.mean) },
        StatRow { label: "Median", value: format_amount(s.median) },
        StatRow { label: "Min", value: format_amount(s.min) },
        StatRow { label: "Max", value: format_amount(s.max) },
        StatRow { label: "Std dev", value: format_amount(s.std_dev) },
    ]
}

pub fn bin_bars(bins: &[DistributionBin]) -> Vec<BinBar> {
    let max = bins.iter().map(|b| b.count).max().unwrap_or(0);
    bins.iter()
        .map(|b| {
            let pct = if max == 0 {
                0.0
            } else {
                b.count as f64 / max as f64 * 100.0
            };
            BinBar {
                label: b.label.clone(),
                count: b.count,
                width_pct: format!("{pct:.0}%"),
            }
        })
        .collect()
}

fn holder_rows(holders: &[Holder]) -> Vec<HolderRow> {
    holders
        .iter()
        .enumerate()
        .map(|(i, h)| HolderRow {
            rank: i + 1,
            address: h.address.clone(),
            address_short: shorten_wallet(&h.address),
            amount_display: format_amount(h.amount),
        })
        .collect()
}

impl OverviewView {
    pub fn from_report(report: &DatasetReport) -> Self {
        Self {
            label: report.label.clone(),
            holders: report.summary.holders,
            pool_wallets: report.summary.pool_wallets,
            total_power_display: format_amount(report.summary.total_power),
            balance_stats: stat_rows(report.balance_stats.as_ref()),
            power_stats: stat_rows(report.voting_power_stats.as_ref()),
            balance_bins: bin_bars(&report.balance_distribution),
            power_bins: bin_bars(&report.voting_power_distribution),
            top_balances: holder_rows(&report.top_balance_holders),
            top_power: holder_rows(&report.top_voting_power_holders),
            gini_display: report
                .balance_concentration
                .as_ref()
                .map(|c| format!("{:.3}", c.gini)),
            top10_display: report
                .balance_concentration
                .as_ref()
                .map(|c| format!("{:.1}%", c.top10_share * 100.0)),
            distinct_pools: report.pool_analysis.distinct_pools,
            pool_reg_display: format_amount(report.pool_analysis.total_pool_reg),
        }
    }
}

impl CorrelationRow {
    pub fn from_profile(p: &WalletPoolProfile) -> Self {
        let boost_color = if p.boost_multiplier >= 2.0 {
            "text-green-400"
        } else if p.boost_multiplier >= 1.0 {
            "text-yellow-400"
        } else {
            "text-red-400"
        };
        Self {
            address: p.address.clone(),
            address_short: shorten_wallet(&p.address),
            total_display: format_amount(p.total_reg),
            pool_display: format_amount(p.pool_liquidity_reg),
            direct_display: format_amount(p.wallet_direct_reg),
            power_display: format_amount(p.power),
            pool_share_display: format_amount(p.pool_voting_share),
            boost_display: format!("{:.2}x", p.boost_multiplier),
            boost_color: boost_color.to_string(),
            position_count: p.positions.len(),
        }
    }
}

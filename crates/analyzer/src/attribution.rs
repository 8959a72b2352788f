//! Splits each wallet's externally computed voting power into the share backed
//! by direct holdings (credited 1:1) and the share generated by pooled
//! liquidity, and derives the resulting boost multipliers.

use std::collections::HashMap;

use serde::Serialize;

use crate::multipliers::MultiplierTable;
use crate::positions::pool_liquidity;
use crate::records::{BalanceRecord, LiquidityPosition, PositionKind, VotingPowerRecord};

/// Case-insensitive address → voting power lookup. Missing addresses have power 0.
#[derive(Debug, Clone, Default)]
pub struct PowerIndex {
    by_address: HashMap<String, f64>,
}

impl PowerIndex {
    pub fn new(records: &[VotingPowerRecord]) -> Self {
        let mut by_address = HashMap::with_capacity(records.len());
        for r in records {
            by_address
                .entry(r.address.to_lowercase())
                .or_insert(r.power.max(0.0));
        }
        Self { by_address }
    }

    pub fn get(&self, address: &str) -> Option<f64> {
        self.by_address.get(&address.to_lowercase()).copied()
    }

    pub fn power_of(&self, address: &str) -> f64 {
        self.get(address).unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletPoolProfile {
    pub address: String,
    #[serde(rename = "totalREG")]
    pub total_reg: f64,
    pub positions: Vec<LiquidityPosition>,
    #[serde(rename = "poolLiquidityREG")]
    pub pool_liquidity_reg: f64,
    #[serde(rename = "walletDirectREG")]
    pub wallet_direct_reg: f64,
    pub power: f64,
    pub wallet_voting_share: f64,
    pub pool_voting_share: f64,
    pub boost_multiplier: f64,
}

impl WalletPoolProfile {
    pub fn has_pools(&self) -> bool {
        !self.positions.is_empty()
    }
}

pub fn build_profile(balance: &BalanceRecord, power: f64) -> WalletPoolProfile {
    let power = power.max(0.0);
    let pool_liquidity_reg = pool_liquidity(&balance.positions);
    // Pool liquidity above the reported total is inconsistent data; direct collapses to 0.
    let wallet_direct_reg = (balance.total_reg - pool_liquidity_reg).max(0.0);
    let (wallet_voting_share, pool_voting_share) = if pool_liquidity_reg > 0.0 {
        // Wallet share is derived from the pool share so the two add back to `power` exactly.
        let pool_share = (power - wallet_direct_reg).max(0.0);
        (power - pool_share, pool_share)
    } else {
        // Nothing is pooled, so power above the direct balance still belongs to the wallet.
        (power, 0.0)
    };
    let boost_multiplier = if pool_liquidity_reg > 0.0 {
        pool_voting_share / pool_liquidity_reg
    } else {
        0.0
    };

    WalletPoolProfile {
        address: balance.address.clone(),
        total_reg: balance.total_reg,
        positions: balance.positions.clone(),
        pool_liquidity_reg,
        wallet_direct_reg,
        power,
        wallet_voting_share,
        pool_voting_share,
        boost_multiplier,
    }
}

pub fn build_profiles(balances: &[BalanceRecord], power: &PowerIndex) -> Vec<WalletPoolProfile> {
    balances
        .iter()
        .map(|b| build_profile(b, power.power_of(&b.address)))
        .collect()
}

/// Wallets with at least one pool position and non-zero power, largest pool
/// liquidity first. The sort is stable so ties keep dataset order.
pub fn pool_power_correlation(
    balances: &[BalanceRecord],
    power: &PowerIndex,
) -> Vec<WalletPoolProfile> {
    let mut profiles: Vec<_> = balances
        .iter()
        .filter(|b| !b.positions.is_empty())
        .map(|b| build_profile(b, power.power_of(&b.address)))
        .filter(|p| p.power > 0.0)
        .collect();
    profiles.sort_by(|a, b| b.pool_liquidity_reg.total_cmp(&a.pool_liquidity_reg));
    profiles
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiplierSource {
    /// Apportioned from the wallet's pool voting share.
    PowerDerived,
    /// Out-of-range concentrated position, pinned to 1.0.
    InactiveRange,
    /// No power to apportion; taken from the static table.
    Estimated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionMultiplier {
    pub position: LiquidityPosition,
    /// Voting power apportioned to this position, when derivable.
    pub power: Option<f64>,
    pub multiplier: f64,
    pub source: MultiplierSource,
}

/// Positions sharing a pool identifier on the same network form one group;
/// positions without a pool identifier are each their own group.
fn pool_groups(positions: &[LiquidityPosition]) -> Vec<usize> {
    let mut keys: HashMap<(&str, &str), usize> = HashMap::new();
    let mut next = 0;
    positions
        .iter()
        .map(|p| {
            let group = match &p.pool_address {
                Some(pool) => *keys.entry((p.network.as_str(), pool.as_str())).or_insert_with(|| {
                    next += 1;
                    next - 1
                }),
                None => {
                    next += 1;
                    next - 1
                }
            };
            group
        })
        .collect()
}

/// Per-position multipliers for one wallet. When the wallet has power and pool
/// liquidity, its pool voting share is apportioned to pools by REG share and
/// then to positions within each pool; otherwise `table` supplies an estimate.
pub fn position_multipliers(
    profile: &WalletPoolProfile,
    table: &MultiplierTable,
) -> Vec<PositionMultiplier> {
    let derivable = profile.pool_liquidity_reg > 0.0 && profile.power > 0.0;
    if !derivable {
        return profile
            .positions
            .iter()
            .map(|p| PositionMultiplier {
                position: p.clone(),
                power: None,
                multiplier: table.estimate(p),
                source: MultiplierSource::Estimated,
            })
            .collect();
    }

    let groups = pool_groups(&profile.positions);
    let mut group_reg: HashMap<usize, f64> = HashMap::new();
    for (p, g) in profile.positions.iter().zip(&groups) {
        *group_reg.entry(*g).or_insert(0.0) += p.reg_amount;
    }

    profile
        .positions
        .iter()
        .zip(&groups)
        .map(|(p, g)| {
            let pool_reg = group_reg.get(g).copied().unwrap_or(p.reg_amount);
            let pool_power = profile.pool_voting_share * pool_reg / profile.pool_liquidity_reg;
            let position_power = pool_power * p.reg_amount / pool_reg;
            let (multiplier, source) = if p.kind == PositionKind::Concentrated && !p.is_active {
                (1.0, MultiplierSource::InactiveRange)
            } else {
                (position_power / p.reg_amount, MultiplierSource::PowerDerived)
            };
            PositionMultiplier {
                position: p.clone(),
                power: Some(position_power),
                multiplier,
                source,
            }
        })
        .collect()
}

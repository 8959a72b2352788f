//! Strict internal records. Nothing untyped crosses past the normalizer.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionKind {
    /// V2-style: no price range, always active.
    Simple,
    /// V3-style: active only while the price is inside its range.
    Concentrated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidityPosition {
    pub network: String,
    pub exchange: String,
    pub pool_address: Option<String>,
    /// REG-equivalent value locked in the position; always > 0.
    #[serde(rename = "regAmount")]
    pub reg_amount: f64,
    pub kind: PositionKind,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceRecord {
    /// Lower-cased.
    pub address: String,
    #[serde(rename = "totalREG")]
    pub total_reg: f64,
    pub positions: Vec<LiquidityPosition>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VotingPowerRecord {
    pub address: String,
    pub power: f64,
}

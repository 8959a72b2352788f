use std::collections::HashSet;

use common::types::RawRecord;
use serde_json::Value;

use crate::positions::extract_positions;
use crate::records::{BalanceRecord, VotingPowerRecord};

pub const ADDRESS_FIELD: &str = "address";
pub const REG_TOTAL_FIELD: &str = "totalBalanceREG";
pub const TOTAL_BALANCE_FIELD: &str = "totalBalance";
pub const VOTING_POWER_FIELD: &str = "votingPower";
pub const SOURCE_BALANCE_FIELD: &str = "sourceBalance";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountRole {
    Balance,
    VotingPower,
}

/// Tolerant numeric coercion: JSON numbers, or strings with `,` / `_` / whitespace
/// thousands separators. Anything else, including NaN and infinities, is `None`.
pub fn parse_amount(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| !matches!(c, ',' | '_') && !c.is_whitespace())
                .collect();
            cleaned.parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn field_amount(record: &RawRecord, field: &str) -> Option<f64> {
    record.get(field).and_then(parse_amount)
}

/// Resolve the amount a row carries for `role`. Never fails: missing or
/// unparsable values resolve to 0, negatives clamp to 0.
pub fn resolve_amount(record: &RawRecord, role: AmountRole) -> f64 {
    let amount = match role {
        AmountRole::Balance => field_amount(record, REG_TOTAL_FIELD)
            .or_else(|| field_amount(record, TOTAL_BALANCE_FIELD)),
        AmountRole::VotingPower => field_amount(record, VOTING_POWER_FIELD),
    };
    amount.unwrap_or(0.0).max(0.0)
}

pub fn normalize_address(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_lowercase())
}

fn record_address(record: &RawRecord) -> Option<String> {
    record
        .get(ADDRESS_FIELD)
        .and_then(Value::as_str)
        .and_then(normalize_address)
}

/// Rows without an address are skipped; for duplicate addresses the first row wins.
pub fn normalize_balances(rows: &[RawRecord]) -> Vec<BalanceRecord> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter_map(|row| {
            let address = record_address(row)?;
            if !seen.insert(address.clone()) {
                return None;
            }
            Some(BalanceRecord {
                address,
                total_reg: resolve_amount(row, AmountRole::Balance),
                positions: extract_positions(row.get(SOURCE_BALANCE_FIELD)),
            })
        })
        .collect()
}

pub fn normalize_voting_power(rows: &[RawRecord]) -> Vec<VotingPowerRecord> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter_map(|row| {
            let address = record_address(row)?;
            if !seen.insert(address.clone()) {
                return None;
            }
            Some(VotingPowerRecord {
                address,
                power: resolve_amount(row, AmountRole::VotingPower),
            })
        })
        .collect()
}

//! Flattens a wallet's `{ network: { dexs: { exchange: [position] } } }` tree
//! into a typed, filtered position list. All knowledge of raw position field
//! names lives here.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::normalizer::parse_amount;
use crate::records::{LiquidityPosition, PositionKind};

pub const DEXS_FIELD: &str = "dexs";
pub const AMOUNT_FIELD: &str = "equivalentREG";
pub const POOL_ADDRESS_FIELD: &str = "poolAddress";
pub const IS_ACTIVE_FIELD: &str = "isActive";
pub const LOWER_BOUND_FIELDS: [&str; 2] = ["tickLower", "minPrice"];
pub const UPPER_BOUND_FIELDS: [&str; 2] = ["tickUpper", "maxPrice"];

fn has_any(obj: &Map<String, Value>, fields: &[&str]) -> bool {
    fields
        .iter()
        .any(|f| obj.get(*f).is_some_and(|v| !v.is_null()))
}

/// Classify one raw position. Returns `None` for positions that carry no
/// REG (`<= 0` or unparsable) and for entries that are not objects.
pub fn classify_position(network: &str, exchange: &str, raw: &Value) -> Option<LiquidityPosition> {
    let obj = raw.as_object()?;
    let reg_amount = obj.get(AMOUNT_FIELD).and_then(parse_amount).unwrap_or(0.0);
    if reg_amount <= 0.0 {
        return None;
    }

    let kind = if has_any(obj, &LOWER_BOUND_FIELDS) && has_any(obj, &UPPER_BOUND_FIELDS) {
        PositionKind::Concentrated
    } else {
        PositionKind::Simple
    };
    let is_active = match kind {
        PositionKind::Simple => true,
        // Unreported activity on a ranged position is not credited.
        PositionKind::Concentrated => obj
            .get(IS_ACTIVE_FIELD)
            .and_then(Value::as_bool)
            .unwrap_or(false),
    };
    let pool_address = obj
        .get(POOL_ADDRESS_FIELD)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    Some(LiquidityPosition {
        network: network.to_string(),
        exchange: exchange.to_string(),
        pool_address,
        reg_amount,
        kind,
        is_active,
    })
}

/// Networks, then exchanges, then list entries, all in source order.
/// Missing or malformed structure yields an empty list.
pub fn extract_positions(source: Option<&Value>) -> Vec<LiquidityPosition> {
    let Some(Value::Object(networks)) = source else {
        return Vec::new();
    };

    let mut positions = Vec::new();
    for (network, data) in networks {
        let Some(Value::Object(dexs)) = data.get(DEXS_FIELD) else {
            continue;
        };
        for (exchange, list) in dexs {
            let Value::Array(raw_positions) = list else {
                continue;
            };
            positions.extend(
                raw_positions
                    .iter()
                    .filter_map(|raw| classify_position(network, exchange, raw)),
            );
        }
    }
    positions
}

pub fn pool_liquidity(positions: &[LiquidityPosition]) -> f64 {
    positions.iter().map(|p| p.reg_amount).sum()
}

/// Unique `(network, exchange)` pairs with at least one surviving position.
pub fn distinct_exchange_count(positions: &[LiquidityPosition]) -> usize {
    positions
        .iter()
        .map(|p| (p.network.as_str(), p.exchange.as_str()))
        .collect::<HashSet<_>>()
        .len()
}

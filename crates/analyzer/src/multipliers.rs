use std::collections::HashMap;

use common::config::Multipliers;

use crate::records::{LiquidityPosition, PositionKind};

/// Static per-exchange / per-kind multiplier estimates. Only consulted when no
/// power-derived ratio exists for a position.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiplierTable {
    exchanges: HashMap<String, f64>,
    default_simple: f64,
    concentrated_active: f64,
    concentrated_inactive: f64,
}

impl Default for MultiplierTable {
    fn default() -> Self {
        Self {
            exchanges: [("balancer", 1.5), ("sushiswap", 1.3), ("honeyswap", 1.4)]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            default_simple: 1.5,
            concentrated_active: 2.5,
            concentrated_inactive: 1.0,
        }
    }
}

impl From<&Multipliers> for MultiplierTable {
    fn from(cfg: &Multipliers) -> Self {
        Self {
            exchanges: cfg
                .exchanges
                .iter()
                .map(|(k, v)| (k.to_lowercase(), *v))
                .collect(),
            default_simple: cfg.default_simple,
            concentrated_active: cfg.concentrated_active,
            concentrated_inactive: cfg.concentrated_inactive,
        }
    }
}

impl MultiplierTable {
    pub fn lookup(&self, exchange: &str, kind: PositionKind, is_active: bool) -> f64 {
        match kind {
            PositionKind::Concentrated if is_active => self.concentrated_active,
            PositionKind::Concentrated => self.concentrated_inactive,
            PositionKind::Simple => self
                .exchanges
                .get(&exchange.to_lowercase())
                .copied()
                .unwrap_or(self.default_simple),
        }
    }

    pub fn estimate(&self, position: &LiquidityPosition) -> f64 {
        self.lookup(&position.exchange, position.kind, position.is_active)
    }

    /// REG-weighted average of [`Self::estimate`] over `positions`; 0 when empty.
    /// A degraded estimate: it need not agree with a wallet's power-derived boost.
    pub fn weighted_average(&self, positions: &[LiquidityPosition]) -> f64 {
        let total: f64 = positions.iter().map(|p| p.reg_amount).sum();
        if total <= 0.0 {
            return 0.0;
        }
        positions
            .iter()
            .map(|p| self.estimate(p) * p.reg_amount)
            .sum::<f64>()
            / total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(exchange: &str, kind: PositionKind, is_active: bool, reg: f64) -> LiquidityPosition {
        LiquidityPosition {
            network: "gnosis".to_string(),
            exchange: exchange.to_string(),
            pool_address: None,
            reg_amount: reg,
            kind,
            is_active,
        }
    }

    #[test]
    fn test_lookup_simple_by_exchange() {
        let t = MultiplierTable::default();
        assert_eq!(t.lookup("balancer", PositionKind::Simple, true), 1.5);
        assert_eq!(t.lookup("SushiSwap", PositionKind::Simple, true), 1.3);
        assert_eq!(t.lookup("honeyswap", PositionKind::Simple, true), 1.4);
        assert_eq!(t.lookup("unknown-dex", PositionKind::Simple, true), 1.5);
    }

    #[test]
    fn test_lookup_concentrated_ignores_exchange() {
        let t = MultiplierTable::default();
        assert_eq!(t.lookup("sushiswap", PositionKind::Concentrated, true), 2.5);
        assert_eq!(t.lookup("sushiswap", PositionKind::Concentrated, false), 1.0);
    }

    #[test]
    fn test_from_config_lowercases_exchange_names() {
        let cfg = Multipliers {
            default_simple: 1.0,
            concentrated_active: 3.0,
            concentrated_inactive: 0.5,
            exchanges: [("Swapr".to_string(), 1.25)].into_iter().collect(),
        };
        let t = MultiplierTable::from(&cfg);
        assert_eq!(t.lookup("swapr", PositionKind::Simple, true), 1.25);
        assert_eq!(t.lookup("balancer", PositionKind::Simple, true), 1.0);
        assert_eq!(t.lookup("x", PositionKind::Concentrated, false), 0.5);
    }

    #[test]
    fn test_weighted_average() {
        let t = MultiplierTable::default();
        let positions = [
            position("sushiswap", PositionKind::Simple, true, 100.0),
            position("sushiswap", PositionKind::Concentrated, true, 300.0),
        ];
        // (1.3 * 100 + 2.5 * 300) / 400
        assert!((t.weighted_average(&positions) - 2.2).abs() < 1e-12);
        assert_eq!(t.weighted_average(&[]), 0.0);
    }
}

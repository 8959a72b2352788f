use serde::Serialize;

use crate::dataset::DatasetSummary;

/// `current - historical` for each summary metric. Negative means the metric shrank.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDelta {
    pub holders: i64,
    pub pool_wallets: i64,
    pub total_power: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotComparison {
    pub date: String,
    pub current: DatasetSummary,
    pub historical: DatasetSummary,
    pub delta: SnapshotDelta,
}

fn signed_diff(current: usize, historical: usize) -> i64 {
    let c = i64::try_from(current).unwrap_or(i64::MAX);
    let h = i64::try_from(historical).unwrap_or(i64::MAX);
    c.saturating_sub(h)
}

pub fn delta(current: &DatasetSummary, historical: &DatasetSummary) -> SnapshotDelta {
    SnapshotDelta {
        holders: signed_diff(current.holders, historical.holders),
        pool_wallets: signed_diff(current.pool_wallets, historical.pool_wallets),
        total_power: current.total_power - historical.total_power,
    }
}

pub fn compare(date: &str, current: DatasetSummary, historical: DatasetSummary) -> SnapshotComparison {
    SnapshotComparison {
        date: date.to_string(),
        delta: delta(&current, &historical),
        current,
        historical,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(holders: usize, pool_wallets: usize, total_power: f64) -> DatasetSummary {
        DatasetSummary {
            holders,
            pool_wallets,
            total_power,
        }
    }

    #[test]
    fn test_delta_preserves_sign() {
        let d = delta(&summary(10, 2, 100.0), &summary(12, 1, 250.0));
        assert_eq!(d.holders, -2);
        assert_eq!(d.pool_wallets, 1);
        assert_eq!(d.total_power, -150.0);
    }

    #[test]
    fn test_identical_summaries_have_zero_delta() {
        let s = summary(7, 3, 42.5);
        let c = compare("01-01-2025", s.clone(), s);
        assert_eq!(
            c.delta,
            SnapshotDelta {
                holders: 0,
                pool_wallets: 0,
                total_power: 0.0
            }
        );
        assert_eq!(c.date, "01-01-2025");
    }
}

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    pub count: usize,
    pub total: f64,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Population standard deviation (divides by `count`).
    pub std_dev: f64,
}

/// `None` for an empty sample: there is nothing to display, which is not an error.
pub fn summarize(values: &[f64]) -> Option<SummaryStats> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let count = sorted.len();
    let n = count as f64;
    let total: f64 = sorted.iter().sum();
    let mean = total / n;
    let mid = count / 2;
    let median = if count % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };
    let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    Some(SummaryStats {
        count,
        total,
        mean,
        median,
        min: sorted[0],
        max: sorted[count - 1],
        std_dev: variance.sqrt(),
    })
}

/// Lower edges of the half-open distribution bins; the last bin is unbounded.
pub const BIN_EDGES: [f64; 6] = [0.0, 100.0, 500.0, 1_000.0, 5_000.0, 10_000.0];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionBin {
    pub label: String,
    pub lower: f64,
    pub upper: Option<f64>,
    pub count: usize,
}

impl DistributionBin {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && self.upper.is_none_or(|u| value < u)
    }
}

fn bin_label(lower: f64, upper: Option<f64>) -> String {
    match upper {
        Some(u) => format!("{lower}-{u}"),
        None => format!("{lower}+"),
    }
}

pub fn empty_bins() -> Vec<DistributionBin> {
    BIN_EDGES
        .iter()
        .enumerate()
        .map(|(i, &lower)| {
            let upper = BIN_EDGES.get(i + 1).copied();
            DistributionBin {
                label: bin_label(lower, upper),
                lower,
                upper,
                count: 0,
            }
        })
        .collect()
}

/// Count values into [`BIN_EDGES`]. Values `<= 0` (and NaN) are not holders and are skipped.
pub fn distribution(values: &[f64]) -> Vec<DistributionBin> {
    let mut bins = empty_bins();
    for &value in values.iter().filter(|v| **v > 0.0) {
        if let Some(bin) = bins.iter_mut().find(|b| b.contains(value)) {
            bin.count += 1;
        }
    }
    bins
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Concentration {
    pub holders: usize,
    /// Share of the positive total held by the ten largest values, in [0, 1].
    pub top10_share: f64,
    /// 0 = perfectly equal, approaching 1 = one holder has everything.
    pub gini: f64,
}

/// Concentration of positive values. `None` when no value is positive.
pub fn concentration(values: &[f64]) -> Option<Concentration> {
    let mut positive: Vec<f64> = values.iter().copied().filter(|v| *v > 0.0).collect();
    if positive.is_empty() {
        return None;
    }
    positive.sort_by(f64::total_cmp);

    let n = positive.len() as f64;
    let total: f64 = positive.iter().sum();
    let top10: f64 = positive.iter().rev().take(10).sum();
    let weighted: f64 = positive
        .iter()
        .enumerate()
        .map(|(i, v)| (i as f64 + 1.0) * v)
        .sum();
    let gini = (2.0 * weighted) / (n * total) - (n + 1.0) / n;

    Some(Concentration {
        holders: positive.len(),
        top10_share: top10 / total,
        gini: gini.clamp(0.0, 1.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_empty_is_none() {
        assert!(summarize(&[]).is_none());
    }

    #[test]
    fn test_summarize_two_values() {
        let s = summarize(&[30.0, 10.0]).unwrap();
        assert_eq!(s.count, 2);
        assert_eq!(s.total, 40.0);
        assert_eq!(s.mean, 20.0);
        assert_eq!(s.median, 20.0);
        assert_eq!(s.min, 10.0);
        assert_eq!(s.max, 30.0);
        assert_eq!(s.std_dev, 10.0);
    }

    #[test]
    fn test_summarize_odd_median_is_center() {
        let s = summarize(&[5.0, 1.0, 100.0]).unwrap();
        assert_eq!(s.median, 5.0);
    }

    #[test]
    fn test_single_value_has_zero_std_dev() {
        let s = summarize(&[42.0]).unwrap();
        assert_eq!(s.std_dev, 0.0);
        assert_eq!(s.median, 42.0);
    }

    #[test]
    fn test_population_std_dev() {
        // Population variance of 2,4,4,4,5,5,7,9 is 4.
        let s = summarize(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((s.std_dev - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_bins_are_half_open() {
        let bins = distribution(&[99.999, 100.0, 499.0, 500.0, 999.0, 1000.0, 5000.0, 10_000.0, 1e9]);
        let counts: Vec<_> = bins.iter().map(|b| b.count).collect();
        assert_eq!(counts, [1, 2, 2, 1, 1, 2]);
    }

    #[test]
    fn test_bins_skip_non_positive() {
        let values = [0.0, -5.0, 1.0, f64::NAN, 20_000.0];
        let bins = distribution(&values);
        let total: usize = bins.iter().map(|b| b.count).sum();
        assert_eq!(total, 2);
        assert_eq!(bins[0].count, 1);
        assert_eq!(bins[5].count, 1);
    }

    #[test]
    fn test_bins_exhaustive_for_positive_values() {
        let values: Vec<f64> = (1..=2_000).map(|i| f64::from(i) * 7.3).collect();
        let bins = distribution(&values);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), values.len());
        assert_eq!(distribution(&values), bins);
    }

    #[test]
    fn test_bin_labels() {
        let bins = empty_bins();
        assert_eq!(bins[0].label, "0-100");
        assert_eq!(bins[5].label, "10000+");
        assert!(bins[5].upper.is_none());
    }

    #[test]
    fn test_concentration_equal_holders() {
        let c = concentration(&[10.0, 10.0, 10.0, 10.0]).unwrap();
        assert_eq!(c.holders, 4);
        assert!(c.gini.abs() < 1e-12);
        assert_eq!(c.top10_share, 1.0);
    }

    #[test]
    fn test_concentration_skewed() {
        let mut values = vec![1.0; 19];
        values.push(981.0);
        let c = concentration(&values).unwrap();
        assert!(c.gini > 0.9);
        assert!((c.top10_share - 0.99).abs() < 1e-12);
        assert!(concentration(&[0.0, -1.0]).is_none());
    }
}

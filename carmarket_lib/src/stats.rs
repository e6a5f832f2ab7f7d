//! Numeric primitives shared by every analytic.
//!
//! All functions here are pure. Empty input yields `None` instead of a
//! NaN, so callers decide what "no data" means for their result.
//!
//! Standard deviation is the population form (sum of squared deviations
//! divided by `n`), used consistently for distributions and z-scores.

use serde::Serialize;

/// Epsilon for floating-point comparisons.
pub const EPSILON: f64 = 0.0001;

/// Arithmetic mean.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let avg = mean(values)?;
    let variance =
        values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Continuous percentile (linear interpolation between order statistics).
///
/// `p` is a fraction in `[0, 1]`; values outside are clamped.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sorted = sorted_copy(values);
    Some(percentile_sorted(&sorted, p))
}

/// Median, i.e. the 0.5 continuous percentile.
pub fn median(values: &[f64]) -> Option<f64> {
    percentile(values, 0.5)
}

/// Percentile over an already sorted, non-empty slice.
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let p = p.clamp(0.0, 1.0);
    let rank = p * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (rank - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Absolute z-score of `x`. `None` when the deviation is zero, in which case
/// the value must be skipped rather than flagged.
pub fn z_score(x: f64, mean: f64, std_dev: f64) -> Option<f64> {
    if std_dev <= 0.0 || !std_dev.is_finite() {
        return None;
    }
    Some((x - mean).abs() / std_dev)
}

/// Round half away from zero to two decimals (monetary and percent outputs).
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Count, centre, spread and quartiles of a numeric sample.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct StatSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub q1: f64,
    pub q3: f64,
    pub min: f64,
    pub max: f64,
    pub stddev: f64,
}

impl StatSummary {
    /// Summarizes `values`, or `None` when there are none.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let sorted = sorted_copy(values);
        let mean = mean(&sorted)?;
        let stddev = std_dev(&sorted)?;
        Some(Self {
            count: sorted.len(),
            mean,
            median: percentile_sorted(&sorted, 0.5),
            q1: percentile_sorted(&sorted, 0.25),
            q3: percentile_sorted(&sorted, 0.75),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            stddev,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_empty() {
        assert_eq!(mean(&[]), None);
        assert!((mean(&[1.0, 2.0, 3.0, 4.0]).unwrap() - 2.5).abs() < EPSILON);
    }

    #[test]
    fn test_population_std_dev() {
        // Population variance of [2,4,4,4,5,5,7,9] is 4.
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((std_dev(&values).unwrap() - 2.0).abs() < EPSILON);
        assert_eq!(std_dev(&[5.0]), Some(0.0));
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [10.0, 20.0, 30.0, 40.0];
        // rank = 0.25 * 3 = 0.75 -> 10 + 0.75 * 10
        assert!((percentile(&values, 0.25).unwrap() - 17.5).abs() < EPSILON);
        assert!((percentile(&values, 0.5).unwrap() - 25.0).abs() < EPSILON);
        assert!((percentile(&values, 0.75).unwrap() - 32.5).abs() < EPSILON);
        assert_eq!(percentile(&values, 0.0), Some(10.0));
        assert_eq!(percentile(&values, 1.0), Some(40.0));
    }

    #[test]
    fn test_percentile_unsorted_input_and_single_value() {
        assert_eq!(median(&[30.0, 10.0, 20.0]), Some(20.0));
        assert_eq!(percentile(&[7.0], 0.9), Some(7.0));
        assert_eq!(percentile(&[], 0.5), None);
    }

    #[test]
    fn test_z_score_zero_deviation_is_undefined() {
        assert_eq!(z_score(10.0, 10.0, 0.0), None);
        assert!((z_score(14.0, 10.0, 2.0).unwrap() - 2.0).abs() < EPSILON);
        assert!((z_score(6.0, 10.0, 2.0).unwrap() - 2.0).abs() < EPSILON);
    }

    #[test]
    fn test_z_score_symmetric_under_negation() {
        let values = [3.0, 9.0, 11.0, 14.0, 40.0];
        let negated: Vec<f64> = values.iter().map(|v| -v).collect();
        let (m, s) = (mean(&values).unwrap(), std_dev(&values).unwrap());
        let (nm, ns) = (mean(&negated).unwrap(), std_dev(&negated).unwrap());
        assert!((nm + m).abs() < EPSILON);
        for (v, n) in values.iter().zip(&negated) {
            let z = z_score(*v, m, s).unwrap();
            let nz = z_score(*n, nm, ns).unwrap();
            assert!((z - nz).abs() < EPSILON);
        }
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.005_1), 1.01);
        assert_eq!(round2(-16.666_666), -16.67);
        assert_eq!(round2(2.0), 2.0);
    }

    #[test]
    fn test_summary_ordering_properties() {
        let samples: [&[f64]; 4] = [
            &[5.0],
            &[1.0, 100.0],
            &[9000.0, 12000.0, 15500.0, 7000.0, 30000.0],
            &[3.0, 3.0, 3.0, 2.0],
        ];
        for values in samples {
            let s = StatSummary::from_values(values).unwrap();
            assert!(s.q1 <= s.median && s.median <= s.q3);
            assert!(s.min <= s.mean && s.mean <= s.max);
            assert_eq!(s.count, values.len());
        }
        assert_eq!(StatSummary::from_values(&[]), None);
    }
}

//! Fair-market-value estimation from comparable listings.

use serde::Serialize;

use carmarket_types::Listing;

use crate::error::AnalyticsError;
use crate::stats::{self, round2, StatSummary};

/// Currency units subtracted per kilometre above the comparables' average.
pub const DEFAULT_MILEAGE_COEFFICIENT: f64 = 0.5;

/// Coarse sample-size label attached to an estimate.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl ConfidenceTier {
    /// `High` from 10 samples, `Medium` from 5, `Low` below.
    pub fn from_sample_size(n: usize) -> Self {
        if n >= 10 {
            ConfidenceTier::High
        } else if n >= 5 {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }
}

impl std::fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConfidenceTier::High => "high",
            ConfidenceTier::Medium => "medium",
            ConfidenceTier::Low => "low",
        };
        write!(f, "{}", s)
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct FairValue {
    pub fair_market_value: f64,
    pub average_price: f64,
    pub median_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub sample_size: usize,
    pub confidence: ConfidenceTier,
}

/// Estimates the fair value of a vehicle from its comparables.
///
/// The base is the median comparable price. With a `target_mileage` and a
/// positive average comparable mileage, the base moves by
/// `(target - average) * coefficient` and is floored at zero.
pub fn estimate_fair_value(
    comparables: &[Listing],
    target_mileage: Option<f64>,
    coefficient: f64,
) -> Result<FairValue, AnalyticsError> {
    let priced: Vec<&Listing> = comparables.iter().filter(|l| l.price().is_some()).collect();
    let prices: Vec<f64> = priced.iter().filter_map(|l| l.price()).collect();
    let summary = StatSummary::from_values(&prices).ok_or(AnalyticsError::NoData)?;

    let mut fmv = summary.median;
    if let Some(target) = target_mileage {
        let mileages: Vec<f64> = priced.iter().filter_map(|l| l.mileage()).collect();
        if let Some(avg_mileage) = stats::mean(&mileages).filter(|m| *m > 0.0) {
            fmv -= (target - avg_mileage) * coefficient;
            fmv = fmv.max(0.0);
        }
    }

    Ok(FairValue {
        fair_market_value: round2(fmv),
        average_price: round2(summary.mean),
        median_price: round2(summary.median),
        min_price: summary.min,
        max_price: summary.max,
        sample_size: summary.count,
        confidence: ConfidenceTier::from_sample_size(summary.count),
    })
}

//! Year-bucketed price evolution and the recent-versus-older trend signal.

use std::collections::BTreeMap;

use serde::Serialize;

use carmarket_types::{Listing, MIN_PLAUSIBLE_YEAR};

use crate::stats::{self, round2, StatSummary};

/// Minimum listings for a model year to appear in the evolution.
pub const MIN_LISTINGS_PER_YEAR: usize = 3;
/// Widest slice compared at either end of the evolution.
pub const MAX_TREND_SLICE: usize = 3;

pub const SEASONAL_NOTE: &str =
    "Listings carry no posting date, so trends are by model year rather than month or quarter.";

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct EvolutionPoint {
    pub year: i32,
    pub listing_count: usize,
    pub avg_price: f64,
    pub median_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
    InsufficientData,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TrendDirection::Increasing => "increasing",
            TrendDirection::Decreasing => "decreasing",
            TrendDirection::Stable => "stable",
            TrendDirection::InsufficientData => "insufficient_data",
        };
        write!(f, "{}", s)
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PriceTrend {
    pub patterns: Vec<EvolutionPoint>,
    pub trend: TrendDirection,
    pub trend_percent: f64,
    pub note: &'static str,
}

/// Price summary per model year, newest first. Years with fewer than
/// [`MIN_LISTINGS_PER_YEAR`] priced listings are dropped.
pub fn price_evolution(listings: &[Listing]) -> Vec<EvolutionPoint> {
    let mut by_year: BTreeMap<i32, Vec<f64>> = BTreeMap::new();
    for listing in listings {
        if let (Some(year), Some(price)) = (listing.year, listing.price()) {
            if year > MIN_PLAUSIBLE_YEAR {
                by_year.entry(year).or_default().push(price);
            }
        }
    }

    by_year
        .into_iter()
        .rev()
        .filter(|(_, prices)| prices.len() >= MIN_LISTINGS_PER_YEAR)
        .filter_map(|(year, prices)| {
            let s = StatSummary::from_values(&prices)?;
            Some(EvolutionPoint {
                year,
                listing_count: s.count,
                avg_price: s.mean,
                median_price: s.median,
                min_price: s.min,
                max_price: s.max,
            })
        })
        .collect()
}

/// Compares the newest model years against the oldest.
///
/// Both slices hold `min(3, n / 2)` points of the newest-first evolution so
/// they never overlap; fewer than two points is insufficient data.
pub fn price_trend(evolution: Vec<EvolutionPoint>) -> PriceTrend {
    let n = evolution.len();
    if n < 2 {
        return PriceTrend {
            patterns: evolution,
            trend: TrendDirection::InsufficientData,
            trend_percent: 0.0,
            note: SEASONAL_NOTE,
        };
    }

    let k = MAX_TREND_SLICE.min(n / 2);
    let averages: Vec<f64> = evolution.iter().map(|p| p.avg_price).collect();
    let recent_avg = stats::mean(&averages[..k]).unwrap_or(0.0);
    let older_avg = stats::mean(&averages[n - k..]).unwrap_or(0.0);

    let trend = if recent_avg > older_avg {
        TrendDirection::Increasing
    } else if recent_avg < older_avg {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    };
    let trend_percent = if older_avg != 0.0 {
        (recent_avg - older_avg) / older_avg * 100.0
    } else {
        0.0
    };

    PriceTrend {
        patterns: evolution,
        trend,
        trend_percent: round2(trend_percent),
        note: SEASONAL_NOTE,
    }
}

//! Z-score outlier detection over listing prices and over yearly mileage.
//!
//! Both detectors share one rule: compute the mean and population standard
//! deviation of the metric over the sample, flag every value whose absolute
//! z-score reaches the threshold, rank by z-score descending and truncate.
//! A sample below the minimum size yields no anomalies rather than an error.

use std::cmp::Ordering;

use serde::Serialize;

use carmarket_types::Listing;

use crate::distribution::mileage_per_year;
use crate::stats::{self, round2};

/// Default z-score threshold.
pub const DEFAULT_THRESHOLD: f64 = 2.0;
/// Default number of anomalies returned.
pub const DEFAULT_LIMIT: usize = 50;
/// Minimum number of valid values before any detection runs.
pub const DEFAULT_MIN_SAMPLES: usize = 10;

/// Detection knobs shared by both modes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnomalyParams {
    pub threshold: f64,
    pub limit: usize,
    pub min_samples: usize,
}

impl Default for AnomalyParams {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            limit: DEFAULT_LIMIT,
            min_samples: DEFAULT_MIN_SAMPLES,
        }
    }
}

/// Direction of a flagged deviation.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    Overpriced,
    Underpriced,
    HighMileage,
    LowMileage,
}

impl std::fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AnomalyType::Overpriced => "overpriced",
            AnomalyType::Underpriced => "underpriced",
            AnomalyType::HighMileage => "high_mileage",
            AnomalyType::LowMileage => "low_mileage",
        };
        write!(f, "{}", s)
    }
}

/// A value flagged by [`flag_outliers`], referring back to its input index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outlier {
    pub index: usize,
    /// Unrounded absolute z-score.
    pub z_score: f64,
    pub above_mean: bool,
}

/// Flags every value with `|z| >= threshold`, in input order.
///
/// Returns nothing when the deviation is zero (no value can be an outlier).
pub fn flag_outliers(values: &[f64], threshold: f64) -> Vec<Outlier> {
    let (Some(mean), Some(std_dev)) = (stats::mean(values), stats::std_dev(values)) else {
        return Vec::new();
    };
    values
        .iter()
        .enumerate()
        .filter_map(|(index, &v)| {
            let z = stats::z_score(v, mean, std_dev)?;
            (z >= threshold).then_some(Outlier {
                index,
                z_score: z,
                above_mean: v > mean,
            })
        })
        .collect()
}

/// A listing whose price deviates from the sample.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PriceAnomaly {
    pub id: i64,
    pub url: Option<String>,
    pub title: Option<String>,
    pub price_eur: f64,
    pub year: Option<i32>,
    pub mileage_km: Option<f64>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub z_score: f64,
    pub anomaly_type: AnomalyType,
}

/// A listing whose yearly mileage deviates from the sample.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MileageAnomaly {
    pub id: i64,
    pub url: Option<String>,
    pub title: Option<String>,
    pub price_eur: Option<f64>,
    pub year: Option<i32>,
    pub mileage_km: f64,
    pub age_years: i32,
    pub mileage_per_year: f64,
    pub make: Option<String>,
    pub model: Option<String>,
    pub z_score: f64,
    pub anomaly_type: AnomalyType,
}

/// Flags listings whose price is an outlier.
///
/// Only strictly positive prices take part. Fewer than
/// `params.min_samples` priced listings yields an empty result.
pub fn detect_price_anomalies(listings: &[Listing], params: &AnomalyParams) -> Vec<PriceAnomaly> {
    let priced: Vec<(&Listing, f64)> = listings
        .iter()
        .filter_map(|l| l.price().map(|p| (l, p)))
        .collect();
    if priced.len() < params.min_samples {
        return Vec::new();
    }

    let prices: Vec<f64> = priced.iter().map(|(_, p)| *p).collect();
    let mut anomalies: Vec<PriceAnomaly> = flag_outliers(&prices, params.threshold)
        .into_iter()
        .map(|o| {
            let (listing, price) = priced[o.index];
            PriceAnomaly {
                id: listing.id,
                url: listing.url.clone(),
                title: listing.title.clone(),
                price_eur: price,
                year: listing.year,
                mileage_km: listing.mileage_km,
                make: listing.make().map(String::from),
                model: listing.model().map(String::from),
                z_score: o.z_score,
                anomaly_type: if o.above_mean {
                    AnomalyType::Overpriced
                } else {
                    AnomalyType::Underpriced
                },
            }
        })
        .collect();

    anomalies.sort_by(|a, b| desc(a.z_score, b.z_score));
    anomalies.truncate(params.limit);
    for a in &mut anomalies {
        a.z_score = round2(a.z_score);
    }
    anomalies
}

/// Flags listings whose mileage per year of age is an outlier.
///
/// Only listings with a positive mileage and a year strictly before
/// `current_year` have a defined yearly mileage.
pub fn detect_mileage_anomalies(
    listings: &[Listing],
    current_year: i32,
    params: &AnomalyParams,
) -> Vec<MileageAnomaly> {
    let rated: Vec<(&Listing, f64)> = listings
        .iter()
        .filter_map(|l| mileage_per_year(l, current_year).map(|mpy| (l, mpy)))
        .filter(|(_, mpy)| *mpy > 0.0)
        .collect();
    if rated.len() < params.min_samples {
        return Vec::new();
    }

    let rates: Vec<f64> = rated.iter().map(|(_, mpy)| *mpy).collect();
    let mut anomalies: Vec<MileageAnomaly> = flag_outliers(&rates, params.threshold)
        .into_iter()
        .filter_map(|o| {
            let (listing, mpy) = rated[o.index];
            Some(MileageAnomaly {
                id: listing.id,
                url: listing.url.clone(),
                title: listing.title.clone(),
                price_eur: listing.price_eur,
                year: listing.year,
                mileage_km: listing.mileage()?,
                age_years: listing.age_at(current_year)?,
                mileage_per_year: mpy,
                make: listing.make().map(String::from),
                model: listing.model().map(String::from),
                z_score: o.z_score,
                anomaly_type: if o.above_mean {
                    AnomalyType::HighMileage
                } else {
                    AnomalyType::LowMileage
                },
            })
        })
        .collect();

    anomalies.sort_by(|a, b| desc(a.z_score, b.z_score));
    anomalies.truncate(params.limit);
    for a in &mut anomalies {
        a.z_score = round2(a.z_score);
    }
    anomalies
}

fn desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::EPSILON;

    fn priced(id: i64, price: f64) -> Listing {
        Listing {
            id,
            price_eur: Some(price),
            ..Listing::default()
        }
    }

    fn driven(id: i64, mileage: f64, year: i32) -> Listing {
        Listing {
            id,
            mileage_km: Some(mileage),
            year: Some(year),
            ..Listing::default()
        }
    }

    #[test]
    fn flag_outliers_five_value_scenario() {
        // mean = 208, population stddev = 396, z(1000) = 2.0
        let values = [10.0, 10.0, 10.0, 10.0, 1000.0];
        let flagged = flag_outliers(&values, 2.0);
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].index, 4);
        assert!((flagged[0].z_score - 2.0).abs() < EPSILON);
        assert!(flagged[0].above_mean);
    }

    #[test]
    fn flag_outliers_zero_deviation_flags_nothing() {
        assert!(flag_outliers(&[5.0; 12], 1.0).is_empty());
        assert!(flag_outliers(&[], 1.0).is_empty());
    }

    #[test]
    fn flag_outliers_symmetric_under_negation() {
        let values = [12.0, 15.0, 11.0, 14.0, 13.0, 90.0, 12.5, 1.0];
        let negated: Vec<f64> = values.iter().map(|v| -v).collect();
        let a = flag_outliers(&values, 1.5);
        let b = flag_outliers(&negated, 1.5);
        assert_eq!(
            a.iter().map(|o| o.index).collect::<Vec<_>>(),
            b.iter().map(|o| o.index).collect::<Vec<_>>()
        );
        for (x, y) in a.iter().zip(&b) {
            assert!((x.z_score - y.z_score).abs() < EPSILON);
            assert_ne!(x.above_mean, y.above_mean);
        }
    }

    #[test]
    fn price_anomalies_flags_overpriced() {
        let mut listings: Vec<Listing> = (1..=9).map(|id| priced(id, 10.0)).collect();
        listings.push(priced(10, 1000.0));
        let anomalies = detect_price_anomalies(&listings, &AnomalyParams::default());
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].id, 10);
        assert_eq!(anomalies[0].anomaly_type, AnomalyType::Overpriced);
        assert_eq!(anomalies[0].z_score, 3.0);
    }

    #[test]
    fn price_anomalies_below_min_samples_is_empty() {
        let listings = vec![
            priced(1, 10.0),
            priced(2, 10.0),
            priced(3, 10.0),
            priced(4, 10.0),
            priced(5, 1000.0),
        ];
        assert!(detect_price_anomalies(&listings, &AnomalyParams::default()).is_empty());
    }

    #[test]
    fn price_anomalies_sorted_and_limited() {
        let mut listings: Vec<Listing> = (1..=20).map(|id| priced(id, 100.0)).collect();
        listings.push(priced(21, 400.0));
        listings.push(priced(22, 10.0));
        listings.push(priced(23, 250.0));
        let params = AnomalyParams {
            threshold: 1.0,
            limit: 2,
            ..AnomalyParams::default()
        };
        let anomalies = detect_price_anomalies(&listings, &params);
        assert_eq!(anomalies.len(), 2);
        assert!(anomalies[0].z_score >= anomalies[1].z_score);
        assert_eq!(anomalies[0].id, 21);
        assert_eq!(anomalies[0].anomaly_type, AnomalyType::Overpriced);
    }

    #[test]
    fn underpriced_classification() {
        let mut listings: Vec<Listing> = (1..=10).map(|id| priced(id, 20000.0)).collect();
        listings.push(priced(11, 500.0));
        let anomalies = detect_price_anomalies(&listings, &AnomalyParams::default());
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].anomaly_type, AnomalyType::Underpriced);
    }

    #[test]
    fn mileage_anomalies_by_yearly_rate() {
        // Ten cars at 10k km/year, one at 100k km/year.
        let mut listings: Vec<Listing> =
            (1..=10).map(|id| driven(id, 50_000.0, 2020)).collect();
        listings.push(driven(11, 500_000.0, 2020));
        // Same-year and yearless listings have no rate and are ignored.
        listings.push(driven(12, 10.0, 2025));
        listings.push(Listing {
            id: 13,
            mileage_km: Some(1.0),
            ..Listing::default()
        });

        let anomalies = detect_mileage_anomalies(&listings, 2025, &AnomalyParams::default());
        assert_eq!(anomalies.len(), 1);
        let a = &anomalies[0];
        assert_eq!(a.id, 11);
        assert_eq!(a.age_years, 5);
        assert!((a.mileage_per_year - 100_000.0).abs() < EPSILON);
        assert_eq!(a.anomaly_type, AnomalyType::HighMileage);
    }

    #[test]
    fn anomaly_type_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&AnomalyType::HighMileage).unwrap(),
            "\"high_mileage\""
        );
        assert_eq!(AnomalyType::Underpriced.to_string(), "underpriced");
    }
}

//! Price and mileage distributions over a filtered listing subset.

use serde::Serialize;

use carmarket_types::Listing;

use crate::error::AnalyticsError;
use crate::stats::{self, StatSummary};

/// Price distribution. Every field is in currency units except `count`.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct PriceDistribution {
    #[serde(flatten)]
    pub summary: StatSummary,
}

/// Mileage distribution, plus the average yearly mileage where listing ages
/// are known.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct MileageDistribution {
    #[serde(flatten)]
    pub summary: StatSummary,
    pub avg_mileage_per_year: Option<f64>,
}

/// Summarizes the strictly positive prices in `listings`.
pub fn price_distribution(listings: &[Listing]) -> Result<PriceDistribution, AnalyticsError> {
    let prices: Vec<f64> = listings.iter().filter_map(Listing::price).collect();
    let summary = StatSummary::from_values(&prices).ok_or(AnalyticsError::NoData)?;
    Ok(PriceDistribution { summary })
}

/// Summarizes the strictly positive mileages in `listings`.
///
/// `avg_mileage_per_year` averages `mileage / age` over listings whose age
/// relative to `current_year` is positive, and is `None` when there are none.
pub fn mileage_distribution(
    listings: &[Listing],
    current_year: i32,
) -> Result<MileageDistribution, AnalyticsError> {
    let mileages: Vec<f64> = listings.iter().filter_map(Listing::mileage).collect();
    let summary = StatSummary::from_values(&mileages).ok_or(AnalyticsError::NoData)?;

    let per_year: Vec<f64> = listings
        .iter()
        .filter_map(|l| mileage_per_year(l, current_year))
        .collect();

    Ok(MileageDistribution {
        summary,
        avg_mileage_per_year: stats::mean(&per_year),
    })
}

/// `mileage / (current_year - year)` when the mileage is positive and the
/// divisor is positive.
pub(crate) fn mileage_per_year(listing: &Listing, current_year: i32) -> Option<f64> {
    let mileage = listing.mileage()?;
    let age = listing.age_at(current_year)?;
    (age > 0).then(|| mileage / age as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::EPSILON;

    fn listing(price: Option<f64>, mileage: Option<f64>, year: Option<i32>) -> Listing {
        Listing {
            price_eur: price,
            mileage_km: mileage,
            year,
            ..Listing::default()
        }
    }

    #[test]
    fn price_distribution_skips_non_positive_prices() {
        let listings = vec![
            listing(Some(10000.0), None, None),
            listing(Some(20000.0), None, None),
            listing(Some(0.0), None, None),
            listing(Some(-5.0), None, None),
            listing(None, None, None),
            listing(Some(30000.0), None, None),
        ];
        let dist = price_distribution(&listings).unwrap();
        assert_eq!(dist.summary.count, 3);
        assert!((dist.summary.mean - 20000.0).abs() < EPSILON);
        assert!((dist.summary.median - 20000.0).abs() < EPSILON);
        assert!((dist.summary.q1 - 15000.0).abs() < EPSILON);
        assert!((dist.summary.q3 - 25000.0).abs() < EPSILON);
        assert_eq!(dist.summary.min, 10000.0);
        assert_eq!(dist.summary.max, 30000.0);
    }

    #[test]
    fn empty_subset_is_no_data() {
        assert!(matches!(
            price_distribution(&[]),
            Err(AnalyticsError::NoData)
        ));
        let unpriced = vec![listing(None, Some(1000.0), None)];
        assert!(matches!(
            price_distribution(&unpriced),
            Err(AnalyticsError::NoData)
        ));
    }

    #[test]
    fn mileage_distribution_reports_yearly_average() {
        let listings = vec![
            listing(None, Some(100_000.0), Some(2015)),
            listing(None, Some(50_000.0), Some(2020)),
            // Same-year listing has no positive divisor.
            listing(None, Some(5_000.0), Some(2025)),
        ];
        let dist = mileage_distribution(&listings, 2025).unwrap();
        assert_eq!(dist.summary.count, 3);
        // (100000/10 + 50000/5) / 2
        assert!((dist.avg_mileage_per_year.unwrap() - 10_000.0).abs() < EPSILON);
    }

    #[test]
    fn mileage_distribution_without_years() {
        let listings = vec![listing(None, Some(80_000.0), None)];
        let dist = mileage_distribution(&listings, 2025).unwrap();
        assert_eq!(dist.avg_mileage_per_year, None);
    }

    #[test]
    fn serializes_flat() {
        let listings = vec![listing(Some(5000.0), None, None)];
        let json = serde_json::to_value(price_distribution(&listings).unwrap()).unwrap();
        assert_eq!(json["count"], 1);
        assert_eq!(json["median"], 5000.0);
        assert!(json.get("summary").is_none());
    }
}

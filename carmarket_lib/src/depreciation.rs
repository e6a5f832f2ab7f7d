//! Depreciation curves from listing prices matched against catalog
//! reference prices.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use carmarket_types::{Listing, PriceReference};

use crate::error::Outcome;
use crate::stats;

/// Matched listings considered per request, in listing id order.
pub const MAX_MATCHED_LISTINGS: usize = 500;

pub const NO_DATA: &str = "No data available";
pub const NO_VALID_DATA: &str = "No valid depreciation data";

/// Aggregate of every valid record at one age.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CurvePoint {
    pub age_years: i32,
    pub avg_current_price: f64,
    pub avg_original_price: f64,
    pub avg_depreciation_percent: f64,
    pub avg_annual_depreciation_rate: f64,
    pub sample_size: usize,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DepreciationSummary {
    pub total_samples: usize,
    pub avg_annual_depreciation_rate: f64,
    pub avg_total_depreciation_percent: f64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DepreciationCurves {
    pub curves: Vec<CurvePoint>,
    pub summary: DepreciationSummary,
}

/// Annualized depreciation in percent per year.
///
/// Callers guarantee `age_years > 0` and `original_price > 0`.
pub fn annual_depreciation_rate(original_price: f64, current_price: f64, age_years: i32) -> f64 {
    (original_price - current_price) / original_price / age_years as f64 * 100.0
}

/// The reference for `model_id` whose year is nearest `year`. Ties go to the
/// earlier reference year.
pub fn nearest_reference(
    references: &[PriceReference],
    model_id: i64,
    year: i32,
) -> Option<&PriceReference> {
    references
        .iter()
        .filter(|r| r.model_id == model_id)
        .min_by_key(|r| ((r.year - year).abs(), r.year))
}

struct Record {
    age_years: i32,
    current_price: f64,
    original_price: f64,
    total_percent: f64,
    annual_rate: f64,
}

/// Builds per-age depreciation curves.
///
/// Each priced, dated listing with a catalog model is paired with the
/// model's nearest reference price. Up to [`MAX_MATCHED_LISTINGS`] pairs are
/// kept; pairs with a non-positive age or reference price are skipped.
pub fn depreciation_curves(
    listings: &[Listing],
    references: &[PriceReference],
) -> Outcome<DepreciationCurves> {
    let mut by_model: HashMap<i64, Vec<PriceReference>> = HashMap::new();
    for r in references {
        by_model.entry(r.model_id).or_default().push(*r);
    }

    let mut sorted: Vec<&Listing> = listings.iter().collect();
    sorted.sort_by_key(|l| l.id);

    let matched: Vec<(f64, i32, &PriceReference)> = sorted
        .into_iter()
        .filter_map(|l| {
            let price = l.price()?;
            let year = l.year?;
            let model_id = l.model_id?;
            let reference = nearest_reference(by_model.get(&model_id)?, model_id, year)?;
            Some((price, year, reference))
        })
        .take(MAX_MATCHED_LISTINGS)
        .collect();
    if matched.is_empty() {
        return Outcome::unavailable(NO_DATA);
    }

    let records: Vec<Record> = matched
        .into_iter()
        .filter_map(|(current_price, year, reference)| {
            let age_years = year - reference.year;
            let original_price = reference.entry_price_eur;
            if age_years <= 0 || original_price <= 0.0 {
                return None;
            }
            Some(Record {
                age_years,
                current_price,
                original_price,
                total_percent: (original_price - current_price) / original_price * 100.0,
                annual_rate: annual_depreciation_rate(original_price, current_price, age_years),
            })
        })
        .collect();
    if records.is_empty() {
        return Outcome::unavailable(NO_VALID_DATA);
    }

    let mut by_age: BTreeMap<i32, Vec<&Record>> = BTreeMap::new();
    for r in &records {
        by_age.entry(r.age_years).or_default().push(r);
    }

    let curves = by_age
        .into_iter()
        .map(|(age_years, group)| CurvePoint {
            age_years,
            avg_current_price: mean_of(&group, |r| r.current_price),
            avg_original_price: mean_of(&group, |r| r.original_price),
            avg_depreciation_percent: mean_of(&group, |r| r.total_percent),
            avg_annual_depreciation_rate: mean_of(&group, |r| r.annual_rate),
            sample_size: group.len(),
        })
        .collect();

    let all: Vec<&Record> = records.iter().collect();
    Outcome::Data(DepreciationCurves {
        curves,
        summary: DepreciationSummary {
            total_samples: records.len(),
            avg_annual_depreciation_rate: mean_of(&all, |r| r.annual_rate),
            avg_total_depreciation_percent: mean_of(&all, |r| r.total_percent),
        },
    })
}

fn mean_of(records: &[&Record], field: impl Fn(&Record) -> f64) -> f64 {
    let values: Vec<f64> = records.iter().map(|r| field(r)).collect();
    stats::mean(&values).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::EPSILON;

    fn listing(id: i64, model_id: i64, year: i32, price: f64) -> Listing {
        Listing {
            id,
            model_id: Some(model_id),
            year: Some(year),
            price_eur: Some(price),
            ..Listing::default()
        }
    }

    fn reference(model_id: i64, year: i32, price: f64) -> PriceReference {
        PriceReference {
            model_id,
            year,
            entry_price_eur: price,
        }
    }

    #[test]
    fn annual_rate_example() {
        let rate = annual_depreciation_rate(20000.0, 12000.0, 4);
        assert!((rate - 10.0).abs() < EPSILON);
    }

    #[test]
    fn nearest_reference_prefers_earlier_on_tie() {
        let refs = vec![
            reference(1, 2016, 20000.0),
            reference(1, 2020, 24000.0),
            reference(2, 2018, 1.0),
        ];
        assert_eq!(nearest_reference(&refs, 1, 2018).unwrap().year, 2016);
        assert_eq!(nearest_reference(&refs, 1, 2019).unwrap().year, 2020);
        assert!(nearest_reference(&refs, 3, 2018).is_none());
    }

    #[test]
    fn curves_group_by_age() {
        // A listing year after its reference year gives a positive age.
        let refs = vec![reference(1, 2014, 20000.0)];
        let listings = vec![
            listing(1, 1, 2018, 12000.0),
            listing(2, 1, 2018, 14000.0),
            listing(3, 1, 2016, 16000.0),
        ];
        let curves = depreciation_curves(&listings, &refs).into_data().unwrap();
        assert_eq!(curves.curves.len(), 2);

        let two = &curves.curves[0];
        assert_eq!(two.age_years, 2);
        assert_eq!(two.sample_size, 1);
        assert!((two.avg_depreciation_percent - 20.0).abs() < EPSILON);
        assert!((two.avg_annual_depreciation_rate - 10.0).abs() < EPSILON);

        let four = &curves.curves[1];
        assert_eq!(four.age_years, 4);
        assert_eq!(four.sample_size, 2);
        assert!((four.avg_current_price - 13000.0).abs() < EPSILON);
        // (40% + 30%) / 2 total, (10 + 7.5) / 2 annual
        assert!((four.avg_depreciation_percent - 35.0).abs() < EPSILON);
        assert!((four.avg_annual_depreciation_rate - 8.75).abs() < EPSILON);

        assert_eq!(curves.summary.total_samples, 3);
        assert!((curves.summary.avg_annual_depreciation_rate - 9.1666).abs() < 0.001);
    }

    #[test]
    fn unmatched_listings_are_no_data() {
        let listings = vec![Listing {
            id: 1,
            year: Some(2018),
            price_eur: Some(9000.0),
            ..Listing::default()
        }];
        let outcome = depreciation_curves(&listings, &[reference(1, 2014, 1.0)]);
        assert_eq!(outcome, Outcome::unavailable(NO_DATA));
    }

    #[test]
    fn non_positive_ages_are_no_valid_data() {
        let refs = vec![reference(1, 2020, 20000.0)];
        let listings = vec![listing(1, 1, 2020, 18000.0), listing(2, 1, 2019, 17000.0)];
        let outcome = depreciation_curves(&listings, &refs);
        assert_eq!(outcome, Outcome::unavailable(NO_VALID_DATA));
    }

    #[test]
    fn caps_matched_listings() {
        let refs = vec![reference(1, 2000, 10000.0)];
        let listings: Vec<Listing> = (1..=600)
            .map(|id| listing(id, 1, 2010, 5000.0))
            .collect();
        let curves = depreciation_curves(&listings, &refs).into_data().unwrap();
        assert_eq!(curves.summary.total_samples, MAX_MATCHED_LISTINGS);
    }
}

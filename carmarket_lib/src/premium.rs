//! Regional price premiums and the per-location price heatmap.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use carmarket_types::Listing;

use crate::stats::{self, round2, StatSummary};

/// Minimum listings in a location before it gets a premium entry.
pub const PREMIUM_MIN_GROUP: usize = 5;
/// Minimum listings in a location before it appears in the heatmap.
pub const HEATMAP_MIN_GROUP: usize = 3;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PremiumType {
    Premium,
    Discount,
}

impl std::fmt::Display for PremiumType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PremiumType::Premium => write!(f, "premium"),
            PremiumType::Discount => write!(f, "discount"),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LocationPremium {
    pub location: String,
    pub listing_count: usize,
    pub avg_price: f64,
    pub premium_amount: f64,
    pub premium_percent: f64,
    pub premium_type: PremiumType,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LocationPremiums {
    pub overall_avg_price: f64,
    pub premiums: Vec<LocationPremium>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct HeatmapEntry {
    pub location: String,
    pub listing_count: usize,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub median_price: f64,
}

/// Groups positive prices by non-empty location.
fn prices_by_location(listings: &[Listing]) -> BTreeMap<&str, Vec<f64>> {
    let mut groups: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for listing in listings {
        if let (Some(location), Some(price)) = (listing.location(), listing.price()) {
            groups.entry(location).or_default().push(price);
        }
    }
    groups
}

/// Compares each location's average price against the overall average.
///
/// Locations with fewer than [`PREMIUM_MIN_GROUP`] priced listings are left
/// out. The result is ordered by average price, highest first, and is empty
/// when no listing has a price.
pub fn location_premiums(listings: &[Listing]) -> LocationPremiums {
    let prices: Vec<f64> = listings.iter().filter_map(Listing::price).collect();
    let overall = stats::mean(&prices).unwrap_or(0.0);
    if overall == 0.0 {
        return LocationPremiums {
            overall_avg_price: 0.0,
            premiums: Vec::new(),
        };
    }

    let mut premiums: Vec<LocationPremium> = prices_by_location(listings)
        .into_iter()
        .filter(|(_, group)| group.len() >= PREMIUM_MIN_GROUP)
        .filter_map(|(location, group)| {
            let avg_price = stats::mean(&group)?;
            let amount = avg_price - overall;
            let percent = if overall > 0.0 {
                amount / overall * 100.0
            } else {
                0.0
            };
            let premium_amount = round2(amount);
            Some(LocationPremium {
                location: location.to_string(),
                listing_count: group.len(),
                avg_price,
                premium_amount,
                premium_percent: round2(percent),
                premium_type: if premium_amount > 0.0 {
                    PremiumType::Premium
                } else {
                    PremiumType::Discount
                },
            })
        })
        .collect();
    premiums.sort_by(|a, b| b.avg_price.partial_cmp(&a.avg_price).unwrap_or(Ordering::Equal));

    LocationPremiums {
        overall_avg_price: overall,
        premiums,
    }
}

/// Price range per location with at least [`HEATMAP_MIN_GROUP`] listings,
/// ordered by average price, highest first.
pub fn location_heatmap(listings: &[Listing]) -> Vec<HeatmapEntry> {
    let mut entries: Vec<HeatmapEntry> = prices_by_location(listings)
        .into_iter()
        .filter(|(_, group)| group.len() >= HEATMAP_MIN_GROUP)
        .filter_map(|(location, group)| {
            let s = StatSummary::from_values(&group)?;
            Some(HeatmapEntry {
                location: location.to_string(),
                listing_count: s.count,
                avg_price: s.mean,
                min_price: s.min,
                max_price: s.max,
                median_price: s.median,
            })
        })
        .collect();
    entries.sort_by(|a, b| b.avg_price.partial_cmp(&a.avg_price).unwrap_or(Ordering::Equal));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(location: &str, price: f64) -> Listing {
        Listing {
            location: Some(location.to_string()),
            price_eur: Some(price),
            ..Listing::default()
        }
    }

    fn many(location: &str, price: f64, n: usize) -> Vec<Listing> {
        (0..n).map(|_| at(location, price)).collect()
    }

    #[test]
    fn premiums_relative_to_overall_mean() {
        let mut listings = many("Zagreb", 15000.0, 5);
        listings.extend(many("Split", 5000.0, 5));
        let result = location_premiums(&listings);
        assert_eq!(result.overall_avg_price, 10000.0);
        assert_eq!(result.premiums.len(), 2);

        let zagreb = &result.premiums[0];
        assert_eq!(zagreb.location, "Zagreb");
        assert_eq!(zagreb.premium_amount, 5000.0);
        assert_eq!(zagreb.premium_percent, 50.0);
        assert_eq!(zagreb.premium_type, PremiumType::Premium);

        let split = &result.premiums[1];
        assert_eq!(split.premium_amount, -5000.0);
        assert_eq!(split.premium_type, PremiumType::Discount);
    }

    #[test]
    fn small_groups_excluded_but_count_toward_overall() {
        let mut listings = many("Zagreb", 10000.0, 5);
        listings.extend(many("Rijeka", 40000.0, 4));
        listings.push(at("", 99999.0));
        let result = location_premiums(&listings);
        assert_eq!(result.premiums.len(), 1);
        assert!(result.premiums.iter().all(|p| p.listing_count >= 5));
        assert!(result.premiums[0].premium_amount < 0.0);
    }

    #[test]
    fn classification_matches_sign() {
        let mut listings = many("A", 100.0, 6);
        listings.extend(many("B", 100.0, 5));
        listings.extend(many("C", 250.0, 7));
        for p in location_premiums(&listings).premiums {
            assert_eq!(p.premium_amount > 0.0, p.premium_type == PremiumType::Premium);
        }
    }

    #[test]
    fn no_prices_yields_empty() {
        let listings = vec![Listing {
            location: Some("Osijek".into()),
            ..Listing::default()
        }];
        let result = location_premiums(&listings);
        assert!(result.premiums.is_empty());
        assert_eq!(result.overall_avg_price, 0.0);
    }

    #[test]
    fn heatmap_uses_lower_threshold() {
        let mut listings = vec![at("Pula", 1000.0), at("Pula", 3000.0), at("Pula", 2000.0)];
        listings.extend(vec![at("Zadar", 500.0), at("Zadar", 700.0)]);
        listings.extend(many("Zagreb", 9000.0, 3));
        let heatmap = location_heatmap(&listings);
        assert_eq!(heatmap.len(), 2);
        assert!(heatmap.iter().all(|e| e.listing_count >= 3));
        assert_eq!(heatmap[0].location, "Zagreb");
        let pula = &heatmap[1];
        assert_eq!(pula.min_price, 1000.0);
        assert_eq!(pula.max_price, 3000.0);
        assert_eq!(pula.median_price, 2000.0);
    }
}

use serde::{Deserialize, Serialize};

use super::Specs;

/// One observed market offer, joined with its catalog make/model when known.
///
/// Price and mileage are nullable in the store. The accessors [`Listing::price`]
/// and [`Listing::mileage`] apply the analytics rule that only strictly
/// positive values take part in any aggregate.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Listing {
    pub id: i64,

    pub url: Option<String>,

    pub title: Option<String>,

    pub price_eur: Option<f64>,

    pub year: Option<i32>,

    pub mileage_km: Option<f64>,

    pub location: Option<String>,

    pub model_id: Option<i64>,

    /// Maker name from the catalog, when the listing references a model.
    pub catalog_make: Option<String>,

    /// Model name from the catalog, when the listing references a model.
    pub catalog_model: Option<String>,

    pub extracted_make: Option<String>,

    pub extracted_model: Option<String>,

    #[serde(default)]
    pub specs: Specs,
}

impl Listing {
    /// Price when present and strictly positive.
    pub fn price(&self) -> Option<f64> {
        self.price_eur.filter(|p| p.is_finite() && *p > 0.0)
    }

    /// Mileage when present and strictly positive.
    pub fn mileage(&self) -> Option<f64> {
        self.mileage_km.filter(|m| m.is_finite() && *m > 0.0)
    }

    /// Catalog maker name, falling back to the raw extracted text.
    pub fn make(&self) -> Option<&str> {
        self.catalog_make
            .as_deref()
            .or(self.extracted_make.as_deref())
    }

    /// Catalog model name, falling back to the raw extracted text.
    pub fn model(&self) -> Option<&str> {
        self.catalog_model
            .as_deref()
            .or(self.extracted_model.as_deref())
    }

    /// Location text, treating empty strings as absent.
    pub fn location(&self) -> Option<&str> {
        self.location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
    }

    /// Age in whole years relative to `current_year`, when the year is known.
    pub fn age_at(&self, current_year: i32) -> Option<i32> {
        self.year.map(|y| current_year - y)
    }
}

/// A raw single-record request, e.g. the body of a price prediction.
///
/// Either catalog names (`make`/`model`) or raw extracted names may be
/// supplied; the extracted names win when both are present.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ListingInput {
    #[serde(default)]
    pub year: Option<i32>,

    #[serde(default)]
    pub mileage_km: Option<f64>,

    #[serde(default)]
    pub make: Option<String>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub extracted_make: Option<String>,

    #[serde(default)]
    pub extracted_model: Option<String>,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub specs: Specs,
}

impl From<&Listing> for ListingInput {
    fn from(listing: &Listing) -> Self {
        Self {
            year: listing.year,
            mileage_km: listing.mileage_km,
            make: listing.catalog_make.clone(),
            model: listing.catalog_model.clone(),
            extracted_make: listing.extracted_make.clone(),
            extracted_model: listing.extracted_model.clone(),
            location: listing.location.clone(),
            specs: listing.specs.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_positive_values_are_excluded() {
        let listing = Listing {
            price_eur: Some(0.0),
            mileage_km: Some(-5.0),
            ..Listing::default()
        };
        assert_eq!(listing.price(), None);
        assert_eq!(listing.mileage(), None);

        let listing = Listing {
            price_eur: Some(12000.0),
            mileage_km: Some(80000.0),
            ..Listing::default()
        };
        assert_eq!(listing.price(), Some(12000.0));
        assert_eq!(listing.mileage(), Some(80000.0));
    }

    #[test]
    fn catalog_names_take_precedence() {
        let listing = Listing {
            catalog_make: Some("Volkswagen".into()),
            extracted_make: Some("VW".into()),
            extracted_model: Some("Golf".into()),
            ..Listing::default()
        };
        assert_eq!(listing.make(), Some("Volkswagen"));
        assert_eq!(listing.model(), Some("Golf"));
    }

    #[test]
    fn blank_location_is_absent() {
        let listing = Listing {
            location: Some("   ".into()),
            ..Listing::default()
        };
        assert_eq!(listing.location(), None);
    }
}

//! Flat feature contract handed to the price regressors.

use serde::Serialize;

use carmarket_types::{Listing, ListingInput};

/// Names of the numeric features, in [`PriceFeatures::numeric`] order.
pub const NUMERIC_FEATURES: [&str; 6] = [
    "year",
    "age",
    "mileage_km",
    "mileage_per_year",
    "power",
    "engine_size",
];

/// Names of the categorical features, in [`PriceFeatures::categorical`] order.
pub const CATEGORICAL_FEATURES: [&str; 5] = ["make", "model", "location", "fuel_type", "transmission"];

/// One record normalized for a predictive model. Categorical values are
/// lower-cased; any missing or unparseable value is `0` or `""`.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct PriceFeatures {
    pub year: f64,
    pub age: f64,
    pub mileage_km: f64,
    pub mileage_per_year: f64,
    pub power: f64,
    pub engine_size: f64,
    pub make: String,
    pub model: String,
    pub location: String,
    pub fuel_type: String,
    pub transmission: String,
}

impl PriceFeatures {
    /// Normalizes a raw request. The raw extracted make/model win over the
    /// catalog names when both are present.
    pub fn prepare(input: &ListingInput, current_year: i32) -> Self {
        let year = input.year.unwrap_or(0);
        let age = f64::from(current_year - input.year.unwrap_or(current_year));
        let mileage_km = input.mileage_km.filter(|m| m.is_finite()).unwrap_or(0.0);
        let mileage_per_year = if mileage_km > 0.0 && age > 0.0 {
            mileage_km / age
        } else {
            0.0
        };

        let lower = |v: Option<&String>| v.map(|s| s.trim().to_lowercase()).unwrap_or_default();

        Self {
            year: f64::from(year),
            age,
            mileage_km,
            mileage_per_year,
            power: input.specs.number_or("power", 0.0),
            engine_size: input.specs.digits_or("engine", 0.0),
            make: lower(input.extracted_make.as_ref().or(input.make.as_ref())),
            model: lower(input.extracted_model.as_ref().or(input.model.as_ref())),
            location: lower(input.location.as_ref()),
            fuel_type: input.specs.text_or("fuel", "").trim().to_string(),
            transmission: input.specs.text_or("transmission", "").trim().to_string(),
        }
    }

    pub fn from_listing(listing: &Listing, current_year: i32) -> Self {
        Self::prepare(&ListingInput::from(listing), current_year)
    }

    pub fn numeric(&self) -> [f64; 6] {
        [
            self.year,
            self.age,
            self.mileage_km,
            self.mileage_per_year,
            self.power,
            self.engine_size,
        ]
    }

    pub fn categorical(&self) -> [&str; 5] {
        [
            &self.make,
            &self.model,
            &self.location,
            &self.fuel_type,
            &self.transmission,
        ]
    }
}

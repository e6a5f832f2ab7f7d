//! CLI subcommand implementations.

pub mod analytics;
pub mod anomalies;
pub mod forecast;
pub mod import;
pub mod models;
pub mod predict;

use anyhow::Result;
use carmarket_lib::validation;
use carmarket_lib::ListingQuery;
use clap::Args;

/// Make/model/year/mileage filter shared by the listing analytics.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Filter by make (partial, case-insensitive; catalog or extracted name)
    #[arg(long)]
    pub make: Option<String>,

    /// Filter by model (partial, case-insensitive; catalog or extracted name)
    #[arg(long)]
    pub model: Option<String>,

    /// Filter by model year (exact)
    #[arg(long)]
    pub year: Option<i32>,

    /// Mileage in km. Most commands keep listings within ±20% of it
    #[arg(long)]
    pub mileage_km: Option<f64>,
}

impl FilterArgs {
    /// Validates the filter fields and builds the listing query.
    pub fn to_query(&self) -> Result<ListingQuery> {
        let mut query = ListingQuery::default();
        if let Some(make) = &self.make {
            query = query.with_make(&validation::validate_search(make)?);
        }
        if let Some(model) = &self.model {
            query = query.with_model(&validation::validate_search(model)?);
        }
        if let Some(year) = self.year {
            query = query.with_year(validation::validate_year(year)?);
        }
        if let Some(mileage) = self.mileage_km {
            query = query.with_mileage_km(validation::validate_mileage(mileage)?);
        }
        Ok(query)
    }
}

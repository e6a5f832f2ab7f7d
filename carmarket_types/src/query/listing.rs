use std::fmt;
use std::str::FromStr;

use crate::errors::Error;
use crate::types::Listing;

use super::common::{
    contains_ci, like_ci, like_contains, Query, QueryCommon, SqlFilter, SqlParam,
};

/// Lower bound multiplier of the mileage window.
const MILEAGE_WINDOW_LOW: f64 = 0.8;
/// Upper bound multiplier of the mileage window.
const MILEAGE_WINDOW_HIGH: f64 = 1.2;
/// Years at or below this are treated as implausible.
pub const MIN_PLAUSIBLE_YEAR: i32 = 1900;

/// Selects a subset of listings.
///
/// Make and model match when either the catalog name or the raw extracted
/// text contains the query as literal text, case-insensitively. All constraints compose with
/// AND; an unset field places no constraint. Rendered against the aliases
/// `l` (listings), `m` (models) and `mk` (makers).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListingQuery {
    pub common: QueryCommon,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    /// Keeps listings whose mileage lies within ±20% of this value.
    pub mileage_km: Option<f64>,
    /// Only listings with a strictly positive price.
    pub priced_only: bool,
    /// Only listings with a strictly positive mileage.
    pub mileage_only: bool,
    /// Only listings with a plausible year (> 1900).
    pub dated_only: bool,
    /// Only listings that reference a catalog model.
    pub catalogued_only: bool,
    pub sort_by: ListingSortBy,
}

impl Query for ListingQuery {
    fn get_common(&mut self) -> &mut QueryCommon {
        &mut self.common
    }

    fn to_sql(&self) -> SqlFilter {
        let mut filter = SqlFilter::default();
        if let Some(make) = &self.make {
            let n = filter.bind(SqlParam::Text(like_contains(make)));
            filter.push(format!(
                "({} OR {})",
                like_ci("mk.name", n),
                like_ci("l.extracted_make", n)
            ));
        }
        if let Some(model) = &self.model {
            let n = filter.bind(SqlParam::Text(like_contains(model)));
            filter.push(format!(
                "({} OR {})",
                like_ci("m.name", n),
                like_ci("l.extracted_model", n)
            ));
        }
        if let Some(year) = self.year {
            let n = filter.bind(SqlParam::Integer(year as i64));
            filter.push(format!("l.year = ?{n}"));
        }
        if let Some(mileage) = self.mileage_km {
            let lo = filter.bind(SqlParam::Real(mileage * MILEAGE_WINDOW_LOW));
            let hi = filter.bind(SqlParam::Real(mileage * MILEAGE_WINDOW_HIGH));
            filter.push(format!("l.mileage_km BETWEEN ?{lo} AND ?{hi}"));
        }
        if self.priced_only {
            filter.push("l.price_eur IS NOT NULL AND l.price_eur > 0");
        }
        if self.mileage_only {
            filter.push("l.mileage_km IS NOT NULL AND l.mileage_km > 0");
        }
        if self.dated_only {
            filter.push(format!(
                "l.year IS NOT NULL AND l.year > {}",
                MIN_PLAUSIBLE_YEAR
            ));
        }
        if self.catalogued_only {
            filter.push("l.model_id IS NOT NULL");
        }
        filter
    }
}

impl ListingQuery {
    pub fn with_make(mut self, make: &str) -> Self {
        self.make = Some(make.to_string());
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_mileage_km(mut self, mileage_km: f64) -> Self {
        self.mileage_km = Some(mileage_km);
        self
    }

    pub fn priced(mut self) -> Self {
        self.priced_only = true;
        self
    }

    pub fn with_mileage(mut self) -> Self {
        self.mileage_only = true;
        self
    }

    pub fn dated(mut self) -> Self {
        self.dated_only = true;
        self
    }

    pub fn catalogued(mut self) -> Self {
        self.catalogued_only = true;
        self
    }

    pub fn with_sort_by(mut self, sort_by: ListingSortBy) -> Self {
        self.sort_by = sort_by;
        self
    }

    /// `ORDER BY` clause for this query's sort key and direction.
    pub fn order_by(&self) -> String {
        format!(
            "ORDER BY {} {}",
            self.sort_by.column(),
            self.common.sort_direction.as_sql()
        )
    }

    /// In-memory form of the same predicate rendered by [`Query::to_sql`].
    pub fn matches(&self, listing: &Listing) -> bool {
        if let Some(make) = &self.make {
            if !contains_ci(listing.catalog_make.as_deref(), make)
                && !contains_ci(listing.extracted_make.as_deref(), make)
            {
                return false;
            }
        }
        if let Some(model) = &self.model {
            if !contains_ci(listing.catalog_model.as_deref(), model)
                && !contains_ci(listing.extracted_model.as_deref(), model)
            {
                return false;
            }
        }
        if let Some(year) = self.year {
            if listing.year != Some(year) {
                return false;
            }
        }
        if let Some(target) = self.mileage_km {
            let lo = target * MILEAGE_WINDOW_LOW;
            let hi = target * MILEAGE_WINDOW_HIGH;
            match listing.mileage_km {
                Some(m) if m >= lo && m <= hi => {}
                _ => return false,
            }
        }
        if self.priced_only && listing.price().is_none() {
            return false;
        }
        if self.mileage_only && listing.mileage().is_none() {
            return false;
        }
        if self.dated_only && !listing.year.is_some_and(|y| y > MIN_PLAUSIBLE_YEAR) {
            return false;
        }
        if self.catalogued_only && listing.model_id.is_none() {
            return false;
        }
        true
    }
}

/// Sort key for listing queries.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum ListingSortBy {
    #[default]
    Id,
    Price,
    Mileage,
    Year,
}

impl ListingSortBy {
    fn column(&self) -> &'static str {
        match self {
            ListingSortBy::Id => "l.id",
            ListingSortBy::Price => "l.price_eur",
            ListingSortBy::Mileage => "l.mileage_km",
            ListingSortBy::Year => "l.year",
        }
    }
}

impl fmt::Display for ListingSortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ListingSortBy::Id => "id",
            ListingSortBy::Price => "price",
            ListingSortBy::Mileage => "mileage",
            ListingSortBy::Year => "year",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ListingSortBy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "id" => Ok(ListingSortBy::Id),
            "price" => Ok(ListingSortBy::Price),
            "mileage" => Ok(ListingSortBy::Mileage),
            "year" => Ok(ListingSortBy::Year),
            _ => Err(Error::UnknownVariant {
                kind: "listing sort key",
                value: s.to_string(),
            }),
        }
    }
}

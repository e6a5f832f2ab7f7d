//! Data contract for the car market analytics workspace: listing, catalog,
//! reference-price and sales records, plus query builders that render the
//! shared make/model/year/mileage filter as parameterized SQL.

mod errors;
mod query;
pub mod types;
pub use self::errors::Error;
pub use self::query::{
    ListingQuery, ListingSortBy, Query, QueryCommon, SalesQuery, SortDirection, SqlFilter,
    SqlParam, CASE_FOLD_FN, MIN_PLAUSIBLE_YEAR,
};
pub use self::types::{
    CatalogEntry, Listing, ListingInput, PriceReference, SaleRecord, SpecValue, Specs,
    YearlySales,
};

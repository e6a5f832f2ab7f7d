mod common;
pub use self::common::{
    Query, QueryCommon, SortDirection, SqlFilter, SqlParam, CASE_FOLD_FN,
};

mod listing;
pub use self::listing::{ListingQuery, ListingSortBy, MIN_PLAUSIBLE_YEAR};

mod sales;
pub use self::sales::SalesQuery;

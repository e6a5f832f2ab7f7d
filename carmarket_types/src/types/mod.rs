mod catalog;
pub use self::catalog::{CatalogEntry, PriceReference, SaleRecord, YearlySales};

mod listing;
pub use self::listing::{Listing, ListingInput};

mod spec;
pub use self::spec::{SpecValue, Specs};

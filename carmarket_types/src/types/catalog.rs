use serde::{Deserialize, Serialize};

/// Canonical maker -> model name pair from the catalog.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub maker_id: i64,
    pub maker: String,
    pub model_id: i64,
    pub model: String,
}

/// Historical original/list price of a catalog model in a reference year.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PriceReference {
    pub model_id: i64,
    pub year: i32,
    pub entry_price_eur: f64,
}

/// Unit sales of a catalog model in one year.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct SaleRecord {
    pub model_id: i64,
    pub year: i32,
    pub units: f64,
}

/// Unit sales summed over every model matching a sales query, for one year.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct YearlySales {
    pub year: i32,
    pub units: f64,
}

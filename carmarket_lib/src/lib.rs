//! Library layer for the car market analytics engine: statistics, anomaly
//! detection, valuation, depreciation and trend analysis over listings.
//!
//! Wraps the `carmarket_types` data contract with a SQLite store, the price
//! and sales model adapters, configuration, input validation, and an async
//! [`MarketEngine`] facade.

pub mod anomaly;
pub mod config;
pub mod db;
pub mod depreciation;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod features;
pub mod model;
pub mod premium;
pub mod stats;
pub mod trend;
pub mod validation;
pub mod valuation;

pub use carmarket_types;
pub use carmarket_types::types;
pub use carmarket_types::{ListingQuery, ListingSortBy, Query, SalesQuery, SortDirection};

pub use config::{AnalyticsConfig, ForecastPolicy};
pub use db::{Db, DbError, MarketShareRow};
pub use engine::{HealthStatus, MarketEngine, ModelStatus, PriceModelStatus};
pub use error::{AnalyticsError, Outcome};
pub use features::PriceFeatures;
pub use model::{ForecasterKind, RegressorKind};

//! Predictive-model adapters: price regressors, sales forecasters, the
//! shared model handle and the forecast cache.

pub mod cache;
pub mod forecaster;
pub mod handle;
pub mod price;
pub mod regressor;

pub use cache::ForecastCache;
pub use forecaster::{ForecastPoint, Forecaster, ForecasterKind, SalesForecast};
pub use handle::ModelHandle;
pub use price::{PriceModel, PricePrediction};
pub use regressor::{Regressor, RegressorKind};

//! Async facade over the store and the analytics components.
//!
//! Every operation fetches a fresh record subset on the blocking pool, then
//! runs the pure computation. Data conditions come back as an
//! [`Outcome::Unavailable`] marker or an empty collection; only store
//! failures and invalid input are returned as `Err`.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use carmarket_types::{Listing, ListingInput, ListingQuery, ListingSortBy, Query, SalesQuery, SortDirection};

use crate::anomaly::{self, AnomalyParams, MileageAnomaly, PriceAnomaly};
use crate::config::{AnalyticsConfig, ForecastPolicy};
use crate::db::{Db, DbError, MarketShareRow};
use crate::depreciation::{self, DepreciationCurves};
use crate::distribution::{self, MileageDistribution, PriceDistribution};
use crate::error::{AnalyticsError, Outcome};
use crate::features::PriceFeatures;
use crate::model::{ForecastCache, ModelHandle, PriceModel, PricePrediction, SalesForecast};
use crate::premium::{self, HeatmapEntry, LocationPremiums};
use crate::trend::{self, EvolutionPoint, PriceTrend};
use crate::validation::current_year;
use crate::valuation::{self, FairValue};

/// Makers reported by [`MarketEngine::market_share`].
pub const MARKET_SHARE_LIMIT: i64 = 20;
pub const MODEL_NOT_TRAINED: &str = "Model not trained";

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PriceModelStatus {
    pub trained: bool,
    pub regressor: Option<&'static str>,
    pub sample_count: Option<usize>,
    pub train_r2: Option<f64>,
    pub test_r2: Option<f64>,
    pub trained_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ModelStatus {
    pub price_model: PriceModelStatus,
    pub forecaster: String,
    pub forecast_policy: String,
    pub cached_forecasts: usize,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct HealthStatus {
    pub status: &'static str,
    pub database: &'static str,
    pub listing_count: Option<i64>,
    pub price_model_loaded: bool,
}

pub struct MarketEngine {
    db: Arc<Mutex<Db>>,
    config: AnalyticsConfig,
    price_model: ModelHandle<PriceModel>,
    forecasts: ForecastCache,
}

impl MarketEngine {
    pub fn new(db: Db, config: AnalyticsConfig) -> Self {
        Self::with_shared_db(Arc::new(Mutex::new(db)), config)
    }

    pub fn with_shared_db(db: Arc<Mutex<Db>>, config: AnalyticsConfig) -> Self {
        let ttl = Duration::from_secs(config.models.forecast_cache_ttl_secs);
        Self {
            db,
            config,
            price_model: ModelHandle::new(),
            forecasts: ForecastCache::new(ttl),
        }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Runs `f` against the store on the blocking pool.
    async fn fetch<T, F>(&self, f: F) -> Result<T, AnalyticsError>
    where
        T: Send + 'static,
        F: FnOnce(&Db) -> Result<T, DbError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let result = tokio::task::spawn_blocking(move || {
            let db = db.lock().unwrap_or_else(|e| e.into_inner());
            f(&db)
        })
        .await?;
        Ok(result?)
    }

    async fn listings(&self, query: ListingQuery) -> Result<Vec<Listing>, AnalyticsError> {
        let rows = self.fetch(move |db| db.query_listings(&query)).await?;
        debug!("Fetched {} listings", rows.len());
        Ok(rows)
    }

    fn anomaly_params(&self, threshold: Option<f64>, limit: Option<usize>) -> AnomalyParams {
        AnomalyParams {
            threshold: threshold.unwrap_or(self.config.anomaly.default_threshold),
            limit: limit.unwrap_or(self.config.anomaly.default_limit),
            min_samples: self.config.anomaly.min_samples,
        }
    }

    pub async fn price_distribution(
        &self,
        filter: &ListingQuery,
    ) -> Result<Outcome<PriceDistribution>, AnalyticsError> {
        let listings = self.listings(filter.clone().priced()).await?;
        Outcome::from_result(distribution::price_distribution(&listings))
    }

    pub async fn mileage_distribution(
        &self,
        filter: &ListingQuery,
    ) -> Result<Outcome<MileageDistribution>, AnalyticsError> {
        let listings = self.listings(filter.clone().with_mileage()).await?;
        Outcome::from_result(distribution::mileage_distribution(&listings, current_year()))
    }

    /// Price outliers among the highest-priced matching listings, up to the
    /// configured sample cap.
    pub async fn price_anomalies(
        &self,
        filter: &ListingQuery,
        threshold: Option<f64>,
        limit: Option<usize>,
    ) -> Result<Vec<PriceAnomaly>, AnalyticsError> {
        let query = filter
            .clone()
            .priced()
            .with_sort_by(ListingSortBy::Price)
            .with_sort_direction(SortDirection::Desc)
            .with_limit(self.config.anomaly.price_sample_cap);
        let listings = self.listings(query).await?;
        Ok(anomaly::detect_price_anomalies(
            &listings,
            &self.anomaly_params(threshold, limit),
        ))
    }

    /// Yearly-mileage outliers among the lowest-mileage matching listings,
    /// up to the configured sample cap.
    pub async fn mileage_anomalies(
        &self,
        filter: &ListingQuery,
        threshold: Option<f64>,
        limit: Option<usize>,
    ) -> Result<Vec<MileageAnomaly>, AnalyticsError> {
        let query = filter
            .clone()
            .with_mileage()
            .dated()
            .with_sort_by(ListingSortBy::Mileage)
            .with_sort_direction(SortDirection::Asc)
            .with_limit(self.config.anomaly.mileage_sample_cap);
        let listings = self.listings(query).await?;
        Ok(anomaly::detect_mileage_anomalies(
            &listings,
            current_year(),
            &self.anomaly_params(threshold, limit),
        ))
    }

    /// Fair value of a vehicle. The filter's `mileage_km` is the target
    /// mileage, not a comparables window.
    pub async fn fair_value(&self, filter: &ListingQuery) -> Result<Outcome<FairValue>, AnalyticsError> {
        let mut query = filter.clone().priced();
        let target = query.mileage_km.take();
        let comparables = self.listings(query).await?;
        Outcome::from_result(valuation::estimate_fair_value(
            &comparables,
            target,
            self.config.valuation.mileage_coefficient,
        ))
    }

    pub async fn location_premiums(&self, filter: &ListingQuery) -> Result<LocationPremiums, AnalyticsError> {
        let listings = self.listings(filter.clone().priced()).await?;
        Ok(premium::location_premiums(&listings))
    }

    pub async fn location_heatmap(&self, filter: &ListingQuery) -> Result<Vec<HeatmapEntry>, AnalyticsError> {
        let listings = self.listings(filter.clone().priced()).await?;
        Ok(premium::location_heatmap(&listings))
    }

    pub async fn depreciation_curves(
        &self,
        filter: &ListingQuery,
    ) -> Result<Outcome<DepreciationCurves>, AnalyticsError> {
        let query = filter
            .clone()
            .catalogued()
            .priced()
            .dated()
            .with_sort_by(ListingSortBy::Id);
        let (listings, references) = self
            .fetch(move |db| {
                let listings = db.query_listings(&query)?;
                let model_ids: Vec<i64> = listings
                    .iter()
                    .filter_map(|l| l.model_id)
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect();
                let references = db.query_price_references(&model_ids)?;
                Ok((listings, references))
            })
            .await?;
        debug!(
            "Depreciation over {} listings and {} reference prices",
            listings.len(),
            references.len()
        );
        Ok(depreciation::depreciation_curves(&listings, &references))
    }

    pub async fn price_evolution(&self, filter: &ListingQuery) -> Result<Vec<EvolutionPoint>, AnalyticsError> {
        let listings = self.listings(filter.clone().priced().dated()).await?;
        Ok(trend::price_evolution(&listings))
    }

    pub async fn price_trend(&self, filter: &ListingQuery) -> Result<PriceTrend, AnalyticsError> {
        let evolution = self.price_evolution(filter).await?;
        Ok(trend::price_trend(evolution))
    }

    async fn train_price_model(&self) -> Result<Arc<PriceModel>, AnalyticsError> {
        let listings = self.fetch(|db| db.query_training_listings()).await?;
        let kind = self.config.models.regressor;
        let min_samples = self.config.models.min_training_samples;
        let year = current_year();
        let model = tokio::task::spawn_blocking(move || {
            PriceModel::train(&listings, kind, min_samples, year)
        })
        .await??;
        Ok(Arc::new(model))
    }

    /// Predicts a price, training the model once first when none is loaded.
    pub async fn predict_price(&self, input: &ListingInput) -> Result<Outcome<PricePrediction>, AnalyticsError> {
        let model = match self.price_model.get_or_train(|| self.train_price_model()).await {
            Ok(model) => model,
            Err(e) if e.is_data_condition() => {
                warn!("Price prediction unavailable: {}", e);
                return Ok(Outcome::unavailable_with(MODEL_NOT_TRAINED, e.to_string()));
            }
            Err(e) => return Err(e),
        };
        let features = PriceFeatures::prepare(input, current_year());
        Outcome::from_result(model.predict(&features))
    }

    /// Forecasts yearly unit sales for the series selected by `query`.
    pub async fn forecast_sales(
        &self,
        query: &SalesQuery,
        periods: usize,
    ) -> Result<Outcome<SalesForecast>, AnalyticsError> {
        let cached = self.config.models.forecast_policy == ForecastPolicy::Cached;
        let key = query.cache_key();

        let hit = if cached { self.forecasts.get(&key) } else { None };
        let forecaster = match hit {
            Some(hit) => {
                debug!("Forecast cache hit for {}", key);
                hit
            }
            None => {
                let q = query.clone();
                let series = self.fetch(move |db| db.query_yearly_sales(&q)).await?;
                let models = &self.config.models;
                let fitted = match models.forecaster.fit(&series, models.min_forecast_years) {
                    Ok(f) => f,
                    Err(e) if e.is_data_condition() => return Ok(Outcome::unavailable(e.to_string())),
                    Err(e) => return Err(e),
                };
                info!("Fitted {} forecaster on {} years", fitted.name(), series.len());
                if cached {
                    self.forecasts.set(key, Arc::clone(&fitted));
                }
                fitted
            }
        };

        Ok(Outcome::Data(SalesForecast {
            forecast: forecaster.forecast(periods),
            model_type: forecaster.name(),
            periods,
        }))
    }

    pub async fn market_share(&self, year: Option<i32>) -> Result<Vec<MarketShareRow>, AnalyticsError> {
        self.fetch(move |db| db.query_market_share(year, MARKET_SHARE_LIMIT))
            .await
    }

    /// Retrains the price model and drops every cached forecaster. A failed
    /// training keeps the previous model.
    pub async fn retrain(&self) -> Result<Outcome<ModelStatus>, AnalyticsError> {
        if let Err(e) = self.price_model.retrain(|| self.train_price_model()).await {
            return Outcome::from_result(Err(e));
        }
        self.forecasts.clear();
        info!("Price model retrained, forecast cache cleared");
        Ok(Outcome::Data(self.model_status()))
    }

    pub fn model_status(&self) -> ModelStatus {
        let price_model = match self.price_model.read() {
            Some(m) => PriceModelStatus {
                trained: true,
                regressor: Some(m.regressor_name()),
                sample_count: Some(m.sample_count),
                train_r2: Some(m.train_r2),
                test_r2: Some(m.test_r2),
                trained_at: Some(m.trained_at),
            },
            None => PriceModelStatus {
                trained: false,
                regressor: None,
                sample_count: None,
                train_r2: None,
                test_r2: None,
                trained_at: None,
            },
        };
        ModelStatus {
            price_model,
            forecaster: self.config.models.forecaster.to_string(),
            forecast_policy: self.config.models.forecast_policy.to_string(),
            cached_forecasts: self.forecasts.len(),
        }
    }

    /// Store connectivity and listing count. Never fails; a store error
    /// reports `degraded`.
    pub async fn health(&self) -> HealthStatus {
        let price_model_loaded = self.price_model.read().is_some();
        match self
            .fetch(|db| {
                db.ping()?;
                db.listing_count()
            })
            .await
        {
            Ok(count) => HealthStatus {
                status: "ok",
                database: "connected",
                listing_count: Some(count),
                price_model_loaded,
            },
            Err(e) => {
                warn!("Health check failed: {}", e);
                HealthStatus {
                    status: "degraded",
                    database: "disconnected",
                    listing_count: None,
                    price_model_loaded,
                }
            }
        }
    }
}

//! Engine configuration.
//!
//! Loaded from an optional TOML file; every field has a default, and a few
//! model settings can be overridden from the environment:
//!
//! - `CARMARKET_REGRESSOR` (`linear` | `random_forest`)
//! - `CARMARKET_FORECASTER` (`linear_trend` | `holt`)
//! - `CARMARKET_FORECAST_POLICY` (`cached` | `always_retrain`)
//! - `CARMARKET_FORECAST_TTL_SECS`

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::anomaly::{DEFAULT_LIMIT, DEFAULT_MIN_SAMPLES, DEFAULT_THRESHOLD};
use crate::error::AnalyticsError;
use crate::model::{ForecasterKind, RegressorKind};
use crate::valuation::DEFAULT_MILEAGE_COEFFICIENT;

/// Whether forecasts reuse a fitted forecaster or refit on every call.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ForecastPolicy {
    #[default]
    Cached,
    AlwaysRetrain,
}

impl fmt::Display for ForecastPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForecastPolicy::Cached => write!(f, "cached"),
            ForecastPolicy::AlwaysRetrain => write!(f, "always_retrain"),
        }
    }
}

impl FromStr for ForecastPolicy {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "cached" => Ok(ForecastPolicy::Cached),
            "always_retrain" => Ok(ForecastPolicy::AlwaysRetrain),
            other => Err(AnalyticsError::Config(format!(
                "unknown forecast policy '{}'",
                other
            ))),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub regressor: RegressorKind,
    pub forecaster: ForecasterKind,
    pub forecast_policy: ForecastPolicy,
    pub forecast_cache_ttl_secs: u64,
    pub min_training_samples: usize,
    pub min_forecast_years: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            regressor: RegressorKind::default(),
            forecaster: ForecasterKind::default(),
            forecast_policy: ForecastPolicy::default(),
            forecast_cache_ttl_secs: 600,
            min_training_samples: 50,
            min_forecast_years: 3,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AnomalyConfig {
    pub default_threshold: f64,
    pub default_limit: usize,
    pub price_sample_cap: i64,
    pub mileage_sample_cap: i64,
    pub min_samples: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            default_threshold: DEFAULT_THRESHOLD,
            default_limit: DEFAULT_LIMIT,
            price_sample_cap: 1000,
            mileage_sample_cap: 2000,
            min_samples: DEFAULT_MIN_SAMPLES,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ValuationConfig {
    pub mileage_coefficient: f64,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            mileage_coefficient: DEFAULT_MILEAGE_COEFFICIENT,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub models: ModelConfig,
    pub anomaly: AnomalyConfig,
    pub valuation: ValuationConfig,
}

impl AnalyticsConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, AnalyticsError> {
        toml::from_str(content).map_err(|e| AnalyticsError::Config(e.to_string()))
    }

    /// Reads `path` when given, otherwise starts from defaults, then applies
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, AnalyticsError> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    AnalyticsError::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                Self::from_toml_str(&content)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), AnalyticsError> {
        if let Some(v) = lookup("CARMARKET_REGRESSOR") {
            self.models.regressor = v.parse()?;
        }
        if let Some(v) = lookup("CARMARKET_FORECASTER") {
            self.models.forecaster = v.parse()?;
        }
        if let Some(v) = lookup("CARMARKET_FORECAST_POLICY") {
            self.models.forecast_policy = v.parse()?;
        }
        if let Some(v) = lookup("CARMARKET_FORECAST_TTL_SECS") {
            self.models.forecast_cache_ttl_secs = v.trim().parse().map_err(|_| {
                AnalyticsError::Config(format!("CARMARKET_FORECAST_TTL_SECS is not a number: '{}'", v))
            })?;
        }
        Ok(())
    }
}

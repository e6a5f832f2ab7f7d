//! Price regressors behind one [`Regressor`] capability.
//!
//! Two `smartcore` estimators are available and chosen by configuration:
//! ridge regression on normalized columns ([`LinearRegressor`]) and a
//! random forest ([`ForestRegressor`]).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::ridge_regression::{
    RidgeRegression, RidgeRegressionParameters, RidgeRegressionSolverName,
};

use crate::error::AnalyticsError;

/// Ridge penalty per training sample.
const RIDGE_ALPHA_PER_SAMPLE: f64 = 1e-3;
const FOREST_TREES: usize = 100;
const FOREST_SEED: u64 = 42;

/// A fitted price regressor over encoded feature rows.
pub trait Regressor: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;
    /// One prediction per row of `x`.
    fn predict(&self, x: &DenseMatrix<f64>) -> Result<Vec<f64>, AnalyticsError>;
}

/// Which regressor [`RegressorKind::fit`] builds.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RegressorKind {
    Linear,
    #[default]
    RandomForest,
}

impl RegressorKind {
    pub fn fit(
        self,
        x: &DenseMatrix<f64>,
        y: &Vec<f64>,
    ) -> Result<Box<dyn Regressor>, AnalyticsError> {
        let (rows, _) = x.shape();
        if rows == 0 || rows != y.len() {
            return Err(AnalyticsError::InvalidInput(format!(
                "regressor needs matching non-empty rows and targets, got {} and {}",
                rows,
                y.len()
            )));
        }
        Ok(match self {
            RegressorKind::Linear => Box::new(LinearRegressor::fit(x, y)?),
            RegressorKind::RandomForest => Box::new(ForestRegressor::fit(x, y)?),
        })
    }
}

impl fmt::Display for RegressorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegressorKind::Linear => write!(f, "linear"),
            RegressorKind::RandomForest => write!(f, "random_forest"),
        }
    }
}

impl FromStr for RegressorKind {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "linear" | "ridge" => Ok(RegressorKind::Linear),
            "random_forest" | "forest" => Ok(RegressorKind::RandomForest),
            other => Err(AnalyticsError::Config(format!("unknown regressor '{}'", other))),
        }
    }
}

/// Ridge regression. Columns are normalized by `smartcore`, which rejects
/// constant columns; [`crate::model::FeatureEncoder`] drops those first.
#[derive(Debug)]
pub struct LinearRegressor {
    model: RidgeRegression<f64, f64, DenseMatrix<f64>, Vec<f64>>,
}

impl LinearRegressor {
    pub fn fit(x: &DenseMatrix<f64>, y: &Vec<f64>) -> Result<Self, AnalyticsError> {
        let params = RidgeRegressionParameters::default()
            .with_alpha(RIDGE_ALPHA_PER_SAMPLE * y.len() as f64)
            .with_normalize(true)
            .with_solver(RidgeRegressionSolverName::Cholesky);
        let model = RidgeRegression::fit(x, y, params)?;
        Ok(Self { model })
    }
}

impl Regressor for LinearRegressor {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn predict(&self, x: &DenseMatrix<f64>) -> Result<Vec<f64>, AnalyticsError> {
        Ok(self.model.predict(x)?)
    }
}

/// Seeded random forest of regression trees.
#[derive(Debug)]
pub struct ForestRegressor {
    model: RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>,
}

impl ForestRegressor {
    pub fn fit(x: &DenseMatrix<f64>, y: &Vec<f64>) -> Result<Self, AnalyticsError> {
        let params = RandomForestRegressorParameters::default()
            .with_n_trees(FOREST_TREES)
            .with_seed(FOREST_SEED);
        let model = RandomForestRegressor::fit(x, y, params)?;
        Ok(Self { model })
    }
}

impl Regressor for ForestRegressor {
    fn name(&self) -> &'static str {
        "random_forest"
    }

    fn predict(&self, x: &DenseMatrix<f64>) -> Result<Vec<f64>, AnalyticsError> {
        Ok(self.model.predict(x)?)
    }
}

/// Sorted-vocabulary label encoding. Unknown values encode to 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut classes: Vec<String> = values.into_iter().map(String::from).collect();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    pub fn encode(&self, value: &str) -> f64 {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(value))
            .map_or(0.0, |i| i as f64)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

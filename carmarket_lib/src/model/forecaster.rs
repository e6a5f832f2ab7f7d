//! Yearly sales forecasters behind one [`Forecaster`] capability.
//!
//! [`LinearTrendForecaster`] fits a least-squares line through the yearly
//! totals and reports a flat ±20% band. [`HoltForecaster`] uses double
//! exponential smoothing with a band widening with the horizon.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use carmarket_types::YearlySales;

use crate::error::AnalyticsError;
use crate::stats;

/// Relative half-width of the linear-trend band.
const LINEAR_BAND: f64 = 0.2;
/// Level smoothing factor.
const HOLT_ALPHA: f64 = 0.5;
/// Trend smoothing factor.
const HOLT_BETA: f64 = 0.3;
/// Two-sided 95% normal quantile.
const Z_95: f64 = 1.96;

/// One forecast year. Values are rounded to whole units.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct ForecastPoint {
    pub year: i32,
    pub predicted_units: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

impl ForecastPoint {
    fn rounded(year: i32, predicted: f64, lower: f64, upper: f64) -> Self {
        Self {
            year,
            predicted_units: predicted.round(),
            lower_bound: lower.round(),
            upper_bound: upper.round(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SalesForecast {
    pub forecast: Vec<ForecastPoint>,
    pub model_type: &'static str,
    pub periods: usize,
}

/// A fitted sales forecaster.
pub trait Forecaster: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;
    /// Forecasts the `periods` years following the last observed year.
    fn forecast(&self, periods: usize) -> Vec<ForecastPoint>;
}

/// Which forecaster [`ForecasterKind::fit`] builds.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ForecasterKind {
    #[default]
    LinearTrend,
    Holt,
}

impl ForecasterKind {
    /// Fits on a yearly series sorted by year, requiring `min_years` points.
    pub fn fit(
        self,
        series: &[YearlySales],
        min_years: usize,
    ) -> Result<Arc<dyn Forecaster>, AnalyticsError> {
        if series.is_empty() {
            return Err(AnalyticsError::NoData);
        }
        let required = min_years.max(2);
        if series.len() < required {
            return Err(AnalyticsError::InsufficientSample {
                what: "sales forecasting (years)",
                required,
                actual: series.len(),
            });
        }
        Ok(match self {
            ForecasterKind::LinearTrend => Arc::new(LinearTrendForecaster::fit(series)),
            ForecasterKind::Holt => Arc::new(HoltForecaster::fit(series)),
        })
    }
}

impl fmt::Display for ForecasterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForecasterKind::LinearTrend => write!(f, "linear_trend"),
            ForecasterKind::Holt => write!(f, "holt"),
        }
    }
}

impl FromStr for ForecasterKind {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "linear_trend" | "linear" => Ok(ForecasterKind::LinearTrend),
            "holt" => Ok(ForecasterKind::Holt),
            other => Err(AnalyticsError::Config(format!("unknown forecaster '{}'", other))),
        }
    }
}

/// Least-squares line through `(year, units)`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearTrendForecaster {
    slope: f64,
    intercept: f64,
    last_year: i32,
}

impl LinearTrendForecaster {
    fn fit(series: &[YearlySales]) -> Self {
        let xs: Vec<f64> = series.iter().map(|s| f64::from(s.year)).collect();
        let ys: Vec<f64> = series.iter().map(|s| s.units).collect();
        let x_mean = stats::mean(&xs).unwrap_or(0.0);
        let y_mean = stats::mean(&ys).unwrap_or(0.0);
        let sxx: f64 = xs.iter().map(|x| (x - x_mean).powi(2)).sum();
        let sxy: f64 = xs
            .iter()
            .zip(&ys)
            .map(|(x, y)| (x - x_mean) * (y - y_mean))
            .sum();
        let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
        Self {
            slope,
            intercept: y_mean - slope * x_mean,
            last_year: series.iter().map(|s| s.year).max().unwrap_or(0),
        }
    }
}

impl Forecaster for LinearTrendForecaster {
    fn name(&self) -> &'static str {
        "linear_trend"
    }

    fn forecast(&self, periods: usize) -> Vec<ForecastPoint> {
        (1..=periods as i32)
            .map(|h| {
                let year = self.last_year + h;
                let predicted = (self.intercept + self.slope * f64::from(year)).max(0.0);
                ForecastPoint::rounded(
                    year,
                    predicted,
                    predicted * (1.0 - LINEAR_BAND),
                    predicted * (1.0 + LINEAR_BAND),
                )
            })
            .collect()
    }
}

/// Double exponential smoothing (Holt's linear method).
#[derive(Debug, Clone, PartialEq)]
pub struct HoltForecaster {
    level: f64,
    trend: f64,
    residual_sd: f64,
    last_year: i32,
}

impl HoltForecaster {
    fn fit(series: &[YearlySales]) -> Self {
        let ys: Vec<f64> = series.iter().map(|s| s.units).collect();
        let mut level = ys[0];
        let mut trend = ys.get(1).map_or(0.0, |y1| y1 - ys[0]);
        let mut residuals = Vec::with_capacity(ys.len());
        for &y in &ys[1..] {
            let expected = level + trend;
            residuals.push(y - expected);
            let next_level = HOLT_ALPHA * y + (1.0 - HOLT_ALPHA) * expected;
            trend = HOLT_BETA * (next_level - level) + (1.0 - HOLT_BETA) * trend;
            level = next_level;
        }
        let squares: Vec<f64> = residuals.iter().map(|r| r * r).collect();
        Self {
            level,
            trend,
            residual_sd: stats::mean(&squares).unwrap_or(0.0).sqrt(),
            last_year: series.iter().map(|s| s.year).max().unwrap_or(0),
        }
    }
}

impl Forecaster for HoltForecaster {
    fn name(&self) -> &'static str {
        "holt"
    }

    fn forecast(&self, periods: usize) -> Vec<ForecastPoint> {
        (1..=periods as i32)
            .map(|h| {
                let predicted = (self.level + f64::from(h) * self.trend).max(0.0);
                let half_width = Z_95 * self.residual_sd * f64::from(h).sqrt();
                ForecastPoint::rounded(
                    self.last_year + h,
                    predicted,
                    (predicted - half_width).max(0.0),
                    predicted + half_width,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(points: &[(i32, f64)]) -> Vec<YearlySales> {
        points
            .iter()
            .map(|&(year, units)| YearlySales { year, units })
            .collect()
    }

    #[test]
    fn linear_trend_extrapolates_with_band() {
        let s = series(&[(2020, 1000.0), (2021, 1100.0), (2022, 1200.0)]);
        let model = ForecasterKind::LinearTrend.fit(&s, 3).unwrap();
        let points = model.forecast(2);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].year, 2023);
        assert_eq!(points[0].predicted_units, 1300.0);
        assert_eq!(points[0].lower_bound, 1040.0);
        assert_eq!(points[0].upper_bound, 1560.0);
        assert_eq!(points[1].predicted_units, 1400.0);
        assert_eq!(model.name(), "linear_trend");
    }

    #[test]
    fn linear_trend_never_negative() {
        let s = series(&[(2020, 300.0), (2021, 200.0), (2022, 100.0)]);
        let model = ForecasterKind::LinearTrend.fit(&s, 3).unwrap();
        let points = model.forecast(4);
        assert!(points.iter().all(|p| p.predicted_units >= 0.0 && p.lower_bound >= 0.0));
        assert_eq!(points[3].predicted_units, 0.0);
    }

    #[test]
    fn holt_follows_exact_trend() {
        let s = series(&[(2019, 100.0), (2020, 200.0), (2021, 300.0), (2022, 400.0)]);
        let model = ForecasterKind::Holt.fit(&s, 3).unwrap();
        let points = model.forecast(3);
        assert_eq!(points[0].year, 2023);
        assert_eq!(points[0].predicted_units, 500.0);
        assert_eq!(points[2].predicted_units, 700.0);
        // No residuals, no band.
        assert_eq!(points[2].lower_bound, 700.0);
        assert_eq!(points[2].upper_bound, 700.0);
    }

    #[test]
    fn holt_band_widens_with_horizon() {
        let s = series(&[
            (2017, 900.0),
            (2018, 1200.0),
            (2019, 1000.0),
            (2020, 1400.0),
            (2021, 1250.0),
        ]);
        let model = ForecasterKind::Holt.fit(&s, 3).unwrap();
        let points = model.forecast(5);
        let widths: Vec<f64> = points.iter().map(|p| p.upper_bound - p.predicted_units).collect();
        assert!(widths.windows(2).all(|w| w[1] >= w[0]));
        assert!(points.iter().all(|p| p.lower_bound >= 0.0));
    }

    #[test]
    fn too_few_years_is_insufficient() {
        let s = series(&[(2021, 10.0), (2022, 12.0)]);
        let err = ForecasterKind::Holt.fit(&s, 3).unwrap_err();
        assert!(matches!(
            err,
            AnalyticsError::InsufficientSample {
                required: 3,
                actual: 2,
                ..
            }
        ));
        assert!(matches!(
            ForecasterKind::LinearTrend.fit(&[], 3).unwrap_err(),
            AnalyticsError::NoData
        ));
    }

    #[test]
    fn kind_parsing() {
        assert_eq!("holt".parse::<ForecasterKind>().unwrap(), ForecasterKind::Holt);
        assert_eq!(
            "linear-trend".parse::<ForecasterKind>().unwrap(),
            ForecasterKind::LinearTrend
        );
        assert!("prophet".parse::<ForecasterKind>().is_err());
    }
}

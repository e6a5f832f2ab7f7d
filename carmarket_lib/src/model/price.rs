//! Price model training: data cleaning, categorical encoding, holdout
//! evaluation, and prediction over [`PriceFeatures`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::metrics::r2;
use smartcore::model_selection::train_test_split;
use tracing::info;

use carmarket_types::Listing;

use super::regressor::{LabelEncoder, Regressor, RegressorKind};
use crate::error::AnalyticsError;
use crate::features::{PriceFeatures, CATEGORICAL_FEATURES, NUMERIC_FEATURES};
use crate::stats::{self, round2};

pub const MODEL_VERSION: &str = "1.0";
/// Fixed confidence reported with every prediction.
pub const PREDICTION_CONFIDENCE: f64 = 0.8;

const MAX_TRAINING_PRICE: f64 = 1_000_000.0;
const MIN_TRAINING_YEAR: i32 = 1990;
const MAX_TRAINING_MILEAGE: f64 = 500_000.0;
const IQR_FACTOR: f64 = 1.5;
const HOLDOUT_FRACTION: f32 = 0.2;
const SPLIT_SEED: u64 = 42;
/// Smallest sample whose 20% holdout still has one row.
const MIN_SPLIT_SAMPLES: usize = 5;

/// Whether a listing is admissible as a training sample before outlier removal.
pub fn is_trainable(listing: &Listing) -> bool {
    let price_ok = listing
        .price_eur
        .is_some_and(|p| p > 0.0 && p < MAX_TRAINING_PRICE);
    let year_ok = listing.year.is_some_and(|y| y >= MIN_TRAINING_YEAR);
    let mileage_ok = listing
        .mileage_km
        .is_some_and(|m| (0.0..MAX_TRAINING_MILEAGE).contains(&m));
    price_ok && year_ok && mileage_ok
}

/// Keeps samples whose `key` lies within `[q1 - 1.5 IQR, q3 + 1.5 IQR]`.
fn iqr_filter<'a>(samples: Vec<&'a Listing>, key: impl Fn(&Listing) -> f64) -> Vec<&'a Listing> {
    let values: Vec<f64> = samples.iter().map(|l| key(l)).collect();
    let (Some(q1), Some(q3)) = (stats::percentile(&values, 0.25), stats::percentile(&values, 0.75))
    else {
        return samples;
    };
    let iqr = q3 - q1;
    let (lo, hi) = (q1 - IQR_FACTOR * iqr, q3 + IQR_FACTOR * iqr);
    samples
        .into_iter()
        .filter(|l| {
            let v = key(l);
            v >= lo && v <= hi
        })
        .collect()
}

/// Admissible listings with price and mileage outliers removed, in that order.
pub fn clean_training_set(listings: &[Listing]) -> Vec<&Listing> {
    let admissible: Vec<&Listing> = listings.iter().filter(|l| is_trainable(l)).collect();
    let by_price = iqr_filter(admissible, |l| l.price_eur.unwrap_or(0.0));
    iqr_filter(by_price, |l| l.mileage_km.unwrap_or(0.0))
}

/// R² of a prediction, zero when undefined (constant targets).
fn score(actual: &Vec<f64>, predicted: &Vec<f64>) -> f64 {
    let s = r2(actual, predicted);
    if s.is_finite() {
        s
    } else {
        0.0
    }
}

/// Label encoders for the categorical features, plus the columns that vary
/// across the fitted sample. Constant columns carry no signal and are left
/// out of every encoded row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureEncoder {
    encoders: Vec<LabelEncoder>,
    active: Vec<usize>,
}

impl FeatureEncoder {
    pub fn fit(features: &[PriceFeatures]) -> Self {
        let encoders = (0..CATEGORICAL_FEATURES.len())
            .map(|i| LabelEncoder::fit(features.iter().map(|f| f.categorical()[i])))
            .collect();
        let mut encoder = Self {
            encoders,
            active: Vec::new(),
        };
        let rows: Vec<Vec<f64>> = features.iter().map(|f| encoder.full_row(f)).collect();
        let width = NUMERIC_FEATURES.len() + CATEGORICAL_FEATURES.len();
        encoder.active = (0..width)
            .filter(|&col| {
                let mut values = rows.iter().map(|r| r[col]);
                values
                    .next()
                    .is_some_and(|first| values.any(|v| v != first))
            })
            .collect();
        encoder
    }

    /// Numeric features followed by the encoded categorical ones.
    fn full_row(&self, features: &PriceFeatures) -> Vec<f64> {
        let mut row = features.numeric().to_vec();
        for (encoder, value) in self.encoders.iter().zip(features.categorical()) {
            row.push(encoder.encode(value));
        }
        row
    }

    /// Number of columns in an encoded row.
    pub fn width(&self) -> usize {
        self.active.len()
    }

    pub fn encode(&self, features: &PriceFeatures) -> Vec<f64> {
        let full = self.full_row(features);
        self.active.iter().map(|&col| full[col]).collect()
    }
}

/// A trained price regressor with its encoders and evaluation.
#[derive(Debug)]
pub struct PriceModel {
    regressor: Box<dyn Regressor>,
    encoder: FeatureEncoder,
    pub sample_count: usize,
    pub train_r2: f64,
    pub test_r2: f64,
    pub trained_at: DateTime<Utc>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PricePrediction {
    pub predicted_price: f64,
    pub confidence: f64,
    pub model_version: &'static str,
}

impl PriceModel {
    /// Cleans `listings`, holds out a seeded 20% and fits `kind` on the rest.
    pub fn train(
        listings: &[Listing],
        kind: RegressorKind,
        min_samples: usize,
        current_year: i32,
    ) -> Result<Self, AnalyticsError> {
        let samples = clean_training_set(listings);
        let required = min_samples.max(MIN_SPLIT_SAMPLES);
        if samples.len() < required {
            return Err(AnalyticsError::InsufficientSample {
                what: "price model training",
                required,
                actual: samples.len(),
            });
        }
        info!("Training {} price model on {} samples", kind, samples.len());

        let features: Vec<PriceFeatures> = samples
            .iter()
            .map(|l| PriceFeatures::from_listing(l, current_year))
            .collect();
        let encoder = FeatureEncoder::fit(&features);
        if encoder.width() == 0 {
            return Err(AnalyticsError::ModelUnavailable(
                "no feature varies across the training sample".to_string(),
            ));
        }
        let rows: Vec<Vec<f64>> = features.iter().map(|f| encoder.encode(f)).collect();
        let targets: Vec<f64> = samples.iter().map(|l| l.price_eur.unwrap_or(0.0)).collect();
        let x = DenseMatrix::from_2d_vec(&rows)?;

        let (x_train, x_test, y_train, y_test) =
            train_test_split(&x, &targets, HOLDOUT_FRACTION, true, Some(SPLIT_SEED));
        let regressor = kind.fit(&x_train, &y_train)?;

        let train_r2 = score(&y_train, &regressor.predict(&x_train)?);
        let test_r2 = score(&y_test, &regressor.predict(&x_test)?);
        info!("Training R2: {:.4}, test R2: {:.4}", train_r2, test_r2);

        Ok(Self {
            regressor,
            encoder,
            sample_count: samples.len(),
            train_r2,
            test_r2,
            trained_at: Utc::now(),
        })
    }

    pub fn regressor_name(&self) -> &'static str {
        self.regressor.name()
    }

    pub fn predict(&self, features: &PriceFeatures) -> Result<PricePrediction, AnalyticsError> {
        let x = DenseMatrix::from_2d_vec(&vec![self.encoder.encode(features)])?;
        let raw = self
            .regressor
            .predict(&x)?
            .first()
            .copied()
            .ok_or_else(|| AnalyticsError::ModelUnavailable("empty prediction".to_string()))?;
        Ok(PricePrediction {
            predicted_price: round2(raw),
            confidence: PREDICTION_CONFIDENCE,
            model_version: MODEL_VERSION,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(id: i64, year: i32, mileage: f64, price: f64) -> Listing {
        Listing {
            id,
            year: Some(year),
            mileage_km: Some(mileage),
            price_eur: Some(price),
            extracted_make: Some(if id % 2 == 0 { "VW" } else { "Audi" }.to_string()),
            ..Listing::default()
        }
    }

    /// Price falls 1000 per year of age and 0.05 per km.
    fn market(n: i64) -> Vec<Listing> {
        (0..n)
            .map(|i| {
                let year = 2010 + (i % 12) as i32;
                let mileage = 20_000.0 + (i * 1_500 % 150_000) as f64;
                let price = 30_000.0 - 1000.0 * (2025 - year) as f64 - 0.05 * mileage;
                listing(i, year, mileage, price)
            })
            .collect()
    }

    #[test]
    fn admissibility_bounds() {
        assert!(is_trainable(&listing(1, 1990, 0.0, 1.0)));
        assert!(!is_trainable(&listing(1, 1989, 10.0, 1000.0)));
        assert!(!is_trainable(&listing(1, 2015, 500_000.0, 1000.0)));
        assert!(!is_trainable(&listing(1, 2015, 1000.0, 1_000_000.0)));
        assert!(!is_trainable(&listing(1, 2015, 1000.0, 0.0)));
        assert!(!is_trainable(&Listing::default()));
    }

    #[test]
    fn iqr_cleaning_drops_extreme_prices() {
        let mut listings = market(60);
        listings.push(listing(999, 2020, 50_000.0, 900_000.0));
        let cleaned = clean_training_set(&listings);
        assert!(cleaned.iter().all(|l| l.id != 999));
        assert!(cleaned.len() >= 55);
    }

    #[test]
    fn too_few_samples_is_insufficient() {
        let err = PriceModel::train(&market(20), RegressorKind::Linear, 50, 2025).unwrap_err();
        assert!(matches!(
            err,
            AnalyticsError::InsufficientSample {
                required: 50,
                actual: 20,
                ..
            }
        ));
    }

    #[test]
    fn linear_model_fits_synthetic_market() {
        let model = PriceModel::train(&market(120), RegressorKind::Linear, 50, 2025).unwrap();
        assert_eq!(model.sample_count, 120);
        assert!(model.train_r2 > 0.95, "train r2 {}", model.train_r2);
        assert_eq!(model.regressor_name(), "linear");

        let features = PriceFeatures::from_listing(&listing(0, 2020, 60_000.0, 0.0), 2025);
        let prediction = model.predict(&features).unwrap();
        // 30000 - 5000 - 3000
        assert!((prediction.predicted_price - 22_000.0).abs() < 1_000.0);
        assert_eq!(prediction.confidence, 0.8);
        assert_eq!(prediction.model_version, "1.0");
    }

    #[test]
    fn split_is_deterministic() {
        let a = PriceModel::train(&market(80), RegressorKind::RandomForest, 50, 2025).unwrap();
        let b = PriceModel::train(&market(80), RegressorKind::RandomForest, 50, 2025).unwrap();
        assert_eq!(a.regressor_name(), "random_forest");
        assert_eq!(a.test_r2, b.test_r2);
        assert_eq!(a.train_r2, b.train_r2);
    }

    #[test]
    fn holdout_needs_five_samples() {
        let err = PriceModel::train(&market(4), RegressorKind::Linear, 0, 2025).unwrap_err();
        assert!(matches!(
            err,
            AnalyticsError::InsufficientSample {
                required: 5,
                actual: 4,
                ..
            }
        ));
    }

    #[test]
    fn identical_listings_have_no_features() {
        let same: Vec<Listing> = (0..10).map(|i| listing(2, 2018, 50_000.0, 10_000.0 + i as f64)).collect();
        let err = PriceModel::train(&same, RegressorKind::Linear, 5, 2025).unwrap_err();
        assert!(matches!(err, AnalyticsError::ModelUnavailable(_)));
    }

    #[test]
    fn encoder_keeps_varying_columns_only() {
        let features = vec![
            PriceFeatures {
                make: "vw".into(),
                ..PriceFeatures::default()
            },
            PriceFeatures {
                make: "audi".into(),
                ..PriceFeatures::default()
            },
        ];
        let encoder = FeatureEncoder::fit(&features);
        assert_eq!(encoder.width(), 1);
        assert_eq!(encoder.encode(&features[0]), vec![1.0]);
        assert_eq!(encoder.encode(&features[1]), vec![0.0]);
        let unseen = PriceFeatures {
            make: "tesla".into(),
            year: 2020.0,
            ..PriceFeatures::default()
        };
        assert_eq!(encoder.encode(&unseen), vec![0.0]);
    }
}

//! Error types for the analytics layer, and the explicit "no data" marker
//! returned in place of a result when the data cannot support one.

use std::fmt;

use serde::Serialize;

use crate::db::DbError;

/// Errors produced by the analytics layer.
///
/// Only [`AnalyticsError::StoreUnavailable`] and
/// [`AnalyticsError::InvalidInput`] surface as failed operations. The data
/// conditions (`NoData`, `InsufficientSample`, `ModelUnavailable`) are turned
/// into an [`Outcome::Unavailable`] marker by the engine.
#[derive(Debug)]
pub enum AnalyticsError {
    /// The filtered subset was empty.
    NoData,
    /// The subset was non-empty but below a component's minimum sample size.
    InsufficientSample {
        what: &'static str,
        required: usize,
        actual: usize,
    },
    /// The backing store failed. Never recovered locally.
    StoreUnavailable(DbError),
    /// The predictive model is absent and could not be trained.
    ModelUnavailable(String),
    /// User-provided input failed validation.
    InvalidInput(String),
    /// Configuration could not be loaded.
    Config(String),
    /// JSON serialization or deserialization failed.
    Serialization(serde_json::Error),
    /// A blocking store or training task panicked or was cancelled.
    Task(String),
}

impl fmt::Display for AnalyticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoData => write!(f, "No data available"),
            Self::InsufficientSample {
                what,
                required,
                actual,
            } => write!(
                f,
                "Insufficient data for {}: need at least {}, found {}",
                what, required, actual
            ),
            Self::StoreUnavailable(e) => write!(f, "Store unavailable: {}", e),
            Self::ModelUnavailable(msg) => write!(f, "Model unavailable: {}", msg),
            Self::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Self::Config(msg) => write!(f, "Config error: {}", msg),
            Self::Serialization(e) => write!(f, "Serialization error: {}", e),
            Self::Task(msg) => write!(f, "Background task failed: {}", msg),
        }
    }
}

impl std::error::Error for AnalyticsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::StoreUnavailable(e) => Some(e),
            Self::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DbError> for AnalyticsError {
    fn from(e: DbError) -> Self {
        Self::StoreUnavailable(e)
    }
}

impl From<tokio::task::JoinError> for AnalyticsError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task(e.to_string())
    }
}

impl From<smartcore::error::Failed> for AnalyticsError {
    fn from(e: smartcore::error::Failed) -> Self {
        Self::ModelUnavailable(e.to_string())
    }
}

impl From<serde_json::Error> for AnalyticsError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e)
    }
}

impl AnalyticsError {
    /// True for conditions that describe the data rather than a failure.
    pub fn is_data_condition(&self) -> bool {
        matches!(
            self,
            Self::NoData | Self::InsufficientSample { .. } | Self::ModelUnavailable(_)
        )
    }
}

/// Result of an analytic: either the computed value or an explicit marker
/// saying why the data could not support one.
///
/// Serializes untagged, so a successful result looks exactly like `T` and a
/// marker looks like `{"error": "...", "message": "..."}`.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Outcome<T> {
    Data(T),
    Unavailable {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl<T> Outcome<T> {
    pub fn unavailable(error: impl Into<String>) -> Self {
        Self::Unavailable {
            error: error.into(),
            message: None,
        }
    }

    pub fn unavailable_with(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            error: error.into(),
            message: Some(message.into()),
        }
    }

    /// Converts a data condition into a marker; store failures and invalid
    /// input pass through as `Err`.
    pub fn from_result(result: Result<T, AnalyticsError>) -> Result<Self, AnalyticsError> {
        match result {
            Ok(value) => Ok(Self::Data(value)),
            Err(e) if e.is_data_condition() => Ok(Self::unavailable(e.to_string())),
            Err(e) => Err(e),
        }
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Data(value) => Some(value),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Self::Data(value) => Some(value),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_sample_message() {
        let e = AnalyticsError::InsufficientSample {
            what: "price training",
            required: 50,
            actual: 12,
        };
        assert_eq!(
            e.to_string(),
            "Insufficient data for price training: need at least 50, found 12"
        );
        assert!(e.is_data_condition());
    }

    #[test]
    fn data_conditions_become_markers() {
        let outcome: Outcome<u32> = Outcome::from_result(Err(AnalyticsError::NoData)).unwrap();
        assert_eq!(outcome, Outcome::unavailable("No data available"));
        assert!(outcome.is_unavailable());
    }

    #[test]
    fn invalid_input_is_not_a_marker() {
        let result: Result<Outcome<u32>, _> =
            Outcome::from_result(Err(AnalyticsError::InvalidInput("bad".into())));
        assert!(matches!(result, Err(AnalyticsError::InvalidInput(_))));
    }

    #[test]
    fn outcome_serializes_untagged() {
        let data: Outcome<u32> = Outcome::Data(7);
        assert_eq!(serde_json::to_string(&data).unwrap(), "7");

        let marker: Outcome<u32> = Outcome::unavailable("No data available");
        assert_eq!(
            serde_json::to_value(&marker).unwrap(),
            serde_json::json!({"error": "No data available"})
        );

        let marker: Outcome<u32> = Outcome::unavailable_with("Model not trained", "too few");
        assert_eq!(
            serde_json::to_value(&marker).unwrap(),
            serde_json::json!({"error": "Model not trained", "message": "too few"})
        );
    }
}

use chrono::{Datelike, Utc};

use crate::error::AnalyticsError;

pub const MAX_SEARCH_LENGTH: usize = 100;
pub const MAX_LOCATION_LENGTH: usize = 120;
pub const MIN_THRESHOLD: f64 = 1.0;
pub const MAX_THRESHOLD: f64 = 5.0;
pub const MAX_LIMIT: i64 = 500;
pub const MAX_FORECAST_PERIODS: i64 = 60;
pub const DEFAULT_FORECAST_PERIODS: usize = 12;

/// Current calendar year (UTC). Ages and yearly mileage are relative to it.
pub fn current_year() -> i32 {
    Utc::now().year()
}

/// Strip ASCII control characters (0x00-0x1F except space 0x20), trim whitespace,
/// and enforce a byte-length limit.
pub fn sanitize_text(input: &str, max_len: usize) -> Result<String, AnalyticsError> {
    if input.len() > max_len {
        return Err(AnalyticsError::InvalidInput(format!(
            "input exceeds maximum length of {} bytes",
            max_len
        )));
    }
    let sanitized: String = input
        .chars()
        .filter(|c| !c.is_ascii_control() || *c == ' ')
        .collect::<String>()
        .trim()
        .to_string();
    if sanitized.is_empty() {
        return Err(AnalyticsError::InvalidInput(
            "input is empty after sanitization".to_string(),
        ));
    }
    Ok(sanitized)
}

/// Validate a make/model search string: enforce length, strip control chars, trim.
pub fn validate_search(input: &str) -> Result<String, AnalyticsError> {
    sanitize_text(input, MAX_SEARCH_LENGTH)
}

pub fn validate_location(input: &str) -> Result<String, AnalyticsError> {
    sanitize_text(input, MAX_LOCATION_LENGTH)
}

/// Validate a model year: after 1900 and at most one year ahead.
pub fn validate_year(year: i32) -> Result<i32, AnalyticsError> {
    let max = current_year() + 1;
    if year <= carmarket_types::MIN_PLAUSIBLE_YEAR || year > max {
        return Err(AnalyticsError::InvalidInput(format!(
            "year must be between {} and {}, got {}",
            carmarket_types::MIN_PLAUSIBLE_YEAR + 1,
            max,
            year
        )));
    }
    Ok(year)
}

/// Validate a mileage in kilometres: finite and non-negative.
pub fn validate_mileage(mileage_km: f64) -> Result<f64, AnalyticsError> {
    if !mileage_km.is_finite() || mileage_km < 0.0 {
        return Err(AnalyticsError::InvalidInput(format!(
            "mileage must be a non-negative number of kilometres, got {}",
            mileage_km
        )));
    }
    Ok(mileage_km)
}

/// Validate an anomaly z-score threshold (1.0..=5.0).
pub fn validate_threshold(threshold: f64) -> Result<f64, AnalyticsError> {
    if !(MIN_THRESHOLD..=MAX_THRESHOLD).contains(&threshold) {
        return Err(AnalyticsError::InvalidInput(format!(
            "threshold must be between {} and {}, got {}",
            MIN_THRESHOLD, MAX_THRESHOLD, threshold
        )));
    }
    Ok(threshold)
}

/// Validate a result limit (1..=500).
pub fn validate_limit(limit: i64) -> Result<usize, AnalyticsError> {
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(AnalyticsError::InvalidInput(format!(
            "limit must be between 1 and {}, got {}",
            MAX_LIMIT, limit
        )));
    }
    Ok(limit as usize)
}

/// Validate a forecast horizon in years (1..=60).
pub fn validate_periods(periods: i64) -> Result<usize, AnalyticsError> {
    if !(1..=MAX_FORECAST_PERIODS).contains(&periods) {
        return Err(AnalyticsError::InvalidInput(format!(
            "periods must be between 1 and {}, got {}",
            MAX_FORECAST_PERIODS, periods
        )));
    }
    Ok(periods as usize)
}
